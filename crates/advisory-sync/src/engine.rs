//! The synchronization engine.
//!
//! One engine owns one source tree. [`SyncEngine::bulk_index`] builds the
//! corpus from scratch through the worker pool; [`SyncEngine::sync_once`]
//! is the incremental pass that indexes new and changed files and removes
//! documents whose source files are gone; [`SyncEngine::run`] repeats that
//! pass on a timer, never overlapping two passes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use advisory_index::IndexManager;
use advisory_types::{Advisory, BoundedMinHeap, Config, FileMeta};

use crate::error::SyncError;
use crate::pool::{Handler, Task, WorkerPool};

/// Default cap for [`SyncEngine::collect_latest`] when the caller passes 0.
const DEFAULT_COLLECT_LIMIT: usize = 50;

/// Counters for one synchronization pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Files indexed or re-indexed.
    pub indexed: u64,
    /// Files left alone because their metadata matched the stored record.
    pub skipped: u64,
    /// Documents removed because their source file disappeared.
    pub deleted: u64,
    /// Per-file failures. A failing file never aborts the pass.
    pub errors: Vec<SyncError>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct SyncEngine {
    manager: Arc<IndexManager>,
    base_path: PathBuf,
    index_path: PathBuf,
    store_path: PathBuf,
    ignore: Vec<String>,
    workers: usize,
    interval: Duration,
    parsed_files: AtomicU64,
}

impl SyncEngine {
    pub fn new(manager: Arc<IndexManager>, config: &Config) -> Self {
        Self {
            manager,
            base_path: config.base_path.clone(),
            index_path: config.index_path.clone(),
            store_path: config.store_path.clone(),
            ignore: config.ignore_files.clone(),
            workers: config.worker_count(),
            interval: config.sync_interval(),
            parsed_files: AtomicU64::new(0),
        }
    }

    /// Number of source files parsed since startup, across every pass.
    pub fn parse_count(&self) -> u64 {
        self.parsed_files.load(Ordering::Relaxed)
    }

    /// Read, parse, and index one source file, recording its metadata for
    /// change detection. The document id is the file name, extension
    /// included.
    pub fn index_file(&self, path: &Path) -> Result<(), SyncError> {
        let meta = std::fs::metadata(path).map_err(|e| SyncError::io(path, e))?;
        let mod_time = meta
            .modified()
            .map_err(|e| SyncError::io(path, e))?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);

        let bytes = std::fs::read(path).map_err(|e| SyncError::io(path, e))?;
        let advisory: Advisory =
            serde_json::from_slice(&bytes).map_err(|source| SyncError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        self.parsed_files.fetch_add(1, Ordering::Relaxed);

        let doc_id = doc_id_for(path);
        self.manager.put(&doc_id, &advisory)?;

        let file_meta = FileMeta {
            mod_time,
            size: meta.len() as i64,
            doc_id: doc_id.clone(),
        };
        self.manager
            .set_file_meta(&path.to_string_lossy(), &file_meta)?;

        debug!(path = %path.display(), doc_id, "Indexed file");
        Ok(())
    }

    /// One incremental pass: index new and changed files, then remove
    /// documents whose tracked source files no longer exist on disk.
    pub fn sync_once(&self) -> SyncReport {
        let mut report = SyncReport::default();
        let mut seen: HashSet<String> = HashSet::new();

        let (files, walk_errors) = self.source_files();
        report.errors.extend(walk_errors);
        for path in files {
            seen.insert(path.to_string_lossy().into_owned());
            if self.needs_index(&path) {
                match self.index_file(&path) {
                    Ok(()) => report.indexed += 1,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to index file");
                        report.errors.push(e);
                    }
                }
            } else {
                report.skipped += 1;
            }
        }

        // Stale pass: tracked files the walk did not visit. A file that
        // still exists was merely excluded this pass (ignore list or
        // filter change) and keeps its document.
        let mut tracked: Vec<(String, FileMeta)> = Vec::new();
        if let Err(e) = self.manager.for_each_file_meta(|path, meta| {
            tracked.push((path.to_string(), meta));
            Ok(())
        }) {
            report.errors.push(e.into());
            return report;
        }
        for (path, meta) in tracked {
            if seen.contains(&path) || Path::new(&path).exists() {
                continue;
            }
            match self.remove_stale(&path, &meta) {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!(path, error = %e, "Failed to remove stale document");
                    report.errors.push(e);
                }
            }
        }

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            deleted = report.deleted,
            errors = report.errors.len(),
            "Sync pass complete"
        );
        report
    }

    /// Build the corpus through the worker pool. Unchanged files are
    /// skipped, so a restart over an already-indexed tree is cheap. Stale
    /// document removal is left to [`SyncEngine::sync_once`].
    pub async fn bulk_index(self: Arc<Self>) -> Result<SyncReport, SyncError> {
        let engine = Arc::clone(&self);
        let handler: Handler = Arc::new(move |task: Task| engine.index_file(&task.path));
        let (pool, mut results) = WorkerPool::new(self.workers, handler);

        let drain = tokio::spawn(async move {
            let mut indexed = 0u64;
            let mut errors = Vec::new();
            while let Some(res) = results.recv().await {
                match res.error {
                    None => indexed += 1,
                    Some(e) => {
                        warn!(id = %res.task.id, error = %e, "Bulk indexing task failed");
                        errors.push(e);
                    }
                }
            }
            (indexed, errors)
        });

        let mut skipped = 0u64;
        let (files, walk_errors) = self.source_files();
        for path in files {
            if !self.needs_index(&path) {
                skipped += 1;
                continue;
            }
            let task = Task {
                id: doc_id_for(&path),
                path,
            };
            pool.submit(task).await?;
        }
        pool.stop().await;

        let (indexed, mut errors) = drain.await.map_err(|e| SyncError::Worker(e.to_string()))?;
        errors.extend(walk_errors);
        let report = SyncReport {
            indexed,
            skipped,
            deleted: 0,
            errors,
        };
        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            errors = report.errors.len(),
            "Bulk indexing complete"
        );
        Ok(report)
    }

    /// Periodic sync loop. Passes run on the blocking pool and never
    /// overlap: a pass that outlives the interval delays the next tick.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; startup indexing already
        // covered it.
        ticker.tick().await;

        info!(interval_secs = self.interval.as_secs(), "Sync loop started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sync loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let engine = Arc::clone(&self);
                    if let Err(e) = tokio::task::spawn_blocking(move || engine.sync_once()).await {
                        warn!(error = %e, "Sync pass panicked");
                    }
                }
            }
        }
    }

    /// The newest advisories straight from disk, bypassing store and
    /// index. A bounded min-heap keeps memory at O(limit) regardless of
    /// tree size; 0 means the default of 50.
    pub fn collect_latest(&self, limit: usize) -> Vec<Advisory> {
        let limit = if limit == 0 { DEFAULT_COLLECT_LIMIT } else { limit };
        let mut heap: BoundedMinHeap<DateTime<Utc>, Advisory> = BoundedMinHeap::new(limit);

        let (files, walk_errors) = self.source_files();
        for e in walk_errors {
            debug!(error = %e, "Ignoring walk error during disk scan");
        }
        for path in files {
            let bytes = match std::fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };
            match serde_json::from_slice::<Advisory>(&bytes) {
                Ok(advisory) => heap.push(advisory.published_at(), advisory),
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping unparsable file"),
            }
        }
        heap.into_descending()
    }

    /// True when the file is new or its size or mtime diverged from the
    /// stored record. Unreadable files are left to the indexing step to
    /// report.
    fn needs_index(&self, path: &Path) -> bool {
        let Ok(meta) = std::fs::metadata(path) else {
            return true;
        };
        let Ok(modified) = meta.modified() else {
            return true;
        };
        let mod_time = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);

        match self.manager.file_meta(&path.to_string_lossy()) {
            Ok(prev) => prev.mod_time != mod_time || prev.size != meta.len() as i64,
            Err(_) => true,
        }
    }

    fn remove_stale(&self, path: &str, meta: &FileMeta) -> Result<(), SyncError> {
        match self.manager.delete(&meta.doc_id) {
            Ok(()) => {}
            // Already gone from the corpus; still drop the metadata.
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        self.manager.delete_file_meta(path)?;
        debug!(path, doc_id = %meta.doc_id, "Removed stale document");
        Ok(())
    }

    /// Every indexable file under the base path, plus any walk-level
    /// errors (an unreadable subdirectory skips a whole subtree, so it
    /// must reach the pass report). The engine's own storage directories
    /// are pruned from the walk so the index never indexes itself.
    fn source_files(&self) -> (Vec<PathBuf>, Vec<SyncError>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();

        let walker = WalkDir::new(&self.base_path)
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && self.is_internal_dir(e.path())));
        for entry in walker {
            match entry {
                Ok(e) => {
                    if e.file_type().is_file() {
                        let path = e.into_path();
                        if self.is_source_file(&path) {
                            files.push(path);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Directory walk error");
                    errors.push(SyncError::Walk(e));
                }
            }
        }
        (files, errors)
    }

    fn is_internal_dir(&self, path: &Path) -> bool {
        path == self.index_path || path == self.store_path
    }

    fn is_source_file(&self, path: &Path) -> bool {
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            return false;
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => !self.ignore.iter().any(|ignored| ignored == name),
            None => false,
        }
    }
}

/// Document ids are file names with the extension kept, so
/// `CVE-2024-0001.json` on disk is `CVE-2024-0001.json` in the corpus.
fn doc_id_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
