//! Command handlers for the advisory daemon CLI.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use advisory_index::IndexManager;
use advisory_sync::SyncEngine;
use advisory_types::Config;

/// Install the global tracing subscriber. `RUST_LOG` wins over the CLI
/// flag, which wins over the `info` default.
pub fn init_logging(log_level: Option<&str>) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(log_level.unwrap_or("info"))
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn load_settings(path: &Path) -> Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    Ok(config.normalize()?)
}

fn open_manager(settings: &Config) -> Result<Arc<IndexManager>> {
    info!("Opening store at {:?}", settings.store_path);
    info!("Opening index at {:?}", settings.index_path);
    let manager = IndexManager::open(&settings.store_path, &settings.index_path)
        .context("Failed to open store and index")?;
    Ok(Arc::new(manager))
}

/// Index the source tree, then keep it in sync until Ctrl+C or SIGTERM.
pub async fn run(config_path: &Path) -> Result<()> {
    let settings = load_settings(config_path)?;
    info!("Advisory daemon starting");
    info!("  Base path: {:?}", settings.base_path);
    info!("  Sync interval: {:?}", settings.sync_interval());
    info!("  Workers: {}", settings.worker_count());

    let manager = open_manager(&settings)?;
    let engine = Arc::new(SyncEngine::new(Arc::clone(&manager), &settings));

    if settings.async_index {
        info!("Initial indexing running in the background");
        let engine = Arc::clone(&engine);
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            match Arc::clone(&engine).bulk_index().await {
                Ok(report) if !report.is_clean() => {
                    warn!(errors = report.errors.len(), "Initial indexing finished with errors")
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Initial indexing failed"),
            }
            if let Err(e) = manager.reconcile() {
                warn!(error = %e, "Startup reconcile failed");
            }
        });
    } else {
        Arc::clone(&engine)
            .bulk_index()
            .await
            .context("Initial indexing failed")?;
        manager.reconcile().context("Startup reconcile failed")?;
    }

    let shutdown = CancellationToken::new();
    let sync_loop = tokio::spawn(Arc::clone(&engine).run(shutdown.clone()));

    wait_for_shutdown().await;
    shutdown.cancel();
    let _ = sync_loop.await;

    info!("Advisory daemon stopped");
    Ok(())
}

/// One incremental sync pass.
pub fn sync(config_path: &Path) -> Result<()> {
    let settings = load_settings(config_path)?;
    let manager = open_manager(&settings)?;
    let engine = SyncEngine::new(manager, &settings);

    let report = engine.sync_once();
    println!(
        "indexed {} / skipped {} / deleted {} / errors {}",
        report.indexed,
        report.skipped,
        report.deleted,
        report.errors.len()
    );
    for e in &report.errors {
        eprintln!("  {e}");
    }
    Ok(())
}

/// Rebuild the search index from the document store, then reconcile.
pub fn reindex(config_path: &Path) -> Result<()> {
    let settings = load_settings(config_path)?;
    let manager = open_manager(&settings)?;

    let indexed = manager.reindex().context("Reindex failed")?;
    let report = manager.reconcile().context("Reconcile failed")?;
    println!(
        "re-indexed {indexed} document(s), reconcile removed {} dangling entr{}",
        report.removed,
        if report.removed == 1 { "y" } else { "ies" }
    );
    Ok(())
}

/// Print the most recently published advisories, newest first.
pub fn latest(config_path: &Path, limit: usize) -> Result<()> {
    let settings = load_settings(config_path)?;
    let manager = open_manager(&settings)?;

    for advisory in manager.list_latest(limit)? {
        let published = advisory
            .cve_metadata
            .date_published
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}\t{}\t{}",
            advisory.cve_metadata.cve_id, published, advisory.containers.cna.title
        );
    }
    Ok(())
}

/// Run a query against the search index.
pub fn search(config_path: &Path, query: &str, limit: usize) -> Result<()> {
    let settings = load_settings(config_path)?;
    let manager = open_manager(&settings)?;

    let results = manager.search(query, limit)?;
    for hit in &results.hits {
        println!("{:.4}\t{}", hit.score, hit.id);
    }
    println!("{} hit(s) of {} total", results.hits.len(), results.total);
    Ok(())
}

/// List the fields of the search schema.
pub fn fields(config_path: &Path) -> Result<()> {
    let settings = load_settings(config_path)?;
    let manager = open_manager(&settings)?;
    for field in manager.fields() {
        println!("{field}");
    }
    Ok(())
}

/// Print the search schema as JSON.
pub fn mapping(config_path: &Path) -> Result<()> {
    let settings = load_settings(config_path)?;
    let manager = open_manager(&settings)?;
    println!("{}", manager.mapping_json()?);
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
