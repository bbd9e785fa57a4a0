use std::path::PathBuf;

use advisory_index::IndexError;
use thiserror::Error;

/// Errors produced while synchronizing the source tree with the corpus.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Worker pool is closed")]
    PoolClosed,

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl SyncError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
