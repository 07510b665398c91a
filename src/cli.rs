//! Command-line interface definition for listsearch-gate
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for the sign-in server, blob maintenance and
//! allow-list checks.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// listsearch-gate - UPN-gated sign-in and knowledge-base blob helper
#[derive(Parser, Debug, Clone)]
#[command(name = "listsearch-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "LISTSEARCH_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the sign-in endpoints
    Serve {
        /// Address to bind, overrides `server.bind`
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Upload or delete blobs in the knowledge-base container
    Blob {
        /// Blob subcommand
        #[command(subcommand)]
        command: BlobCommand,
    },

    /// Evaluate a UPN against the configured allow-list
    CheckUpn {
        /// User principal name to check
        upn: String,
    },
}

/// Blob subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum BlobCommand {
    /// Upload text content, replacing any existing blob of the same name
    Upload {
        /// Blob name
        #[arg(short, long)]
        name: String,

        /// Read content from this file
        #[arg(short, long, conflicts_with = "content", required_unless_present = "content")]
        file: Option<PathBuf>,

        /// Inline content
        #[arg(long)]
        content: Option<String>,
    },

    /// Delete a blob; missing blobs are not an error
    Delete {
        /// Blob name
        #[arg(short, long)]
        name: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
