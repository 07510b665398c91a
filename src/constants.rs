//! Shared constants for the sign-in gate and blob store.

/// Container that holds every blob written by [`BlobStore`](crate::storage::BlobStore).
pub const BLOB_CONTAINER_NAME: &str = "listsearch-kb";

/// Relative path users are sent to when the allow-list rejects them.
pub const INVALID_USER_PATH: &str = "/Account/InvalidUser";

/// Authentication type of the interactive, allow-list gated scheme.
pub const APP_LOGIN_SCHEME: &str = "AppLogin";

/// Authentication type of the passive scheme used to acquire SharePoint tokens.
pub const SHAREPOINT_APP_LOGIN_SCHEME: &str = "SharePointAppLogin";

/// Authentication type of the cookie scheme sessions are signed into.
pub const COOKIE_SCHEME: &str = "Cookies";

/// Claim type carrying the user principal name.
pub const UPN_CLAIM_TYPE: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/upn";

/// Claim type carrying the display name (usually the email address).
pub const NAME_CLAIM_TYPE: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";
