//! Command-line interface for Cinevault.

mod commands;

use clap::{Parser, Subcommand};

/// Cinevault - movie catalogue JSON API
#[derive(Parser)]
#[command(name = "cinevault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server (default)
    #[command(alias = "daemon")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Grant a permission code to a user
    Grant {
        /// Email address of the user
        email: String,
        /// Permission code, e.g. movies:write
        permission: String,
    },

    /// Delete expired tokens of every scope
    #[command(alias = "purge")]
    PurgeTokens,
}

pub use commands::*;
