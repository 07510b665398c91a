//! UPN allow-list
//!
//! The allow-list is parsed once from a `;`-delimited configuration string
//! and is immutable afterwards. Membership is case-insensitive. An absent or
//! empty configuration value produces an empty list, which denies everyone.

use std::collections::BTreeSet;

/// Immutable, case-insensitive set of permitted user principal names.
///
/// # Examples
///
/// ```
/// use listsearch_gate::auth::allow_list::AllowList;
///
/// let list = AllowList::parse(Some("a@x.com; b@y.com ;"));
/// assert_eq!(list.len(), 2);
/// assert!(list.contains("A@X.COM"));
/// assert!(!list.contains("c@z.com"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    /// Entries as configured (trimmed, original casing preserved).
    entries: Vec<String>,
    /// Lower-cased entries used for lookups.
    folded: BTreeSet<String>,
}

impl AllowList {
    /// Parses the configured allow-list string.
    ///
    /// Splits on `;`, trims each entry and drops empty ones. Duplicate
    /// entries that differ only in casing are kept once, first spelling wins.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut list = Self::default();
        let Some(raw) = raw else {
            return list;
        };

        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            if list.folded.insert(fold(entry)) {
                list.entries.push(entry.to_string());
            }
        }
        list
    }

    /// Returns `true` when `upn` matches an entry, ignoring case.
    pub fn contains(&self, upn: &str) -> bool {
        self.folded.contains(&fold(upn))
    }

    /// Configured entries, in configuration order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no user can pass the gate.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn fold(value: &str) -> String {
    value.to_lowercase()
}
