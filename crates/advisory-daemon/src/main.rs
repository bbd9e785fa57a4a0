//! Advisory Indexing Daemon
//!
//! Keeps a searchable corpus of CVE advisories in sync with a directory
//! of JSON source files.
//!
//! # Usage
//!
//! ```bash
//! advisory-daemon --config config.json run
//! advisory-daemon --config config.json sync
//! advisory-daemon --config config.json reindex
//! advisory-daemon --config config.json latest --limit 20
//! advisory-daemon --config config.json search "cve_id:CVE-2024-0001"
//! ```

use anyhow::Result;
use clap::Parser;

use advisory_daemon::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    commands::init_logging(cli.log_level.as_deref())?;

    match cli.command {
        Commands::Run => commands::run(&cli.config).await?,
        Commands::Sync => commands::sync(&cli.config)?,
        Commands::Reindex => commands::reindex(&cli.config)?,
        Commands::Latest { limit } => commands::latest(&cli.config, limit)?,
        Commands::Search { query, limit } => commands::search(&cli.config, &query, limit)?,
        Commands::Fields => commands::fields(&cli.config)?,
        Commands::Mapping => commands::mapping(&cli.config)?,
    }

    Ok(())
}
