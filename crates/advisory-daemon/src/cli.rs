//! CLI argument parsing for the advisory daemon.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Advisory Indexing Daemon
///
/// Keeps a searchable corpus of CVE advisories in sync with a directory
/// of JSON source files.
#[derive(Parser, Debug)]
#[command(name = "advisory-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index the source tree and keep it in sync until interrupted
    Run,

    /// Perform a single incremental sync pass and exit
    Sync,

    /// Rebuild the search index from the document store
    Reindex,

    /// Show the most recently published advisories
    Latest {
        /// Result cap; 0 means the default of 50
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },

    /// Query the search index
    Search {
        /// Query string, e.g. `cve_id:CVE-2024-0001` or free text
        query: String,

        /// Maximum number of hits
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// List the fields of the search schema
    Fields,

    /// Print the search schema as JSON
    Mapping,
}
