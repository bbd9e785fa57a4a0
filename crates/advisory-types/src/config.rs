//! Process configuration.
//!
//! Loaded from a JSON file by the daemon; the interesting part is
//! [`Config::normalize`], which cleans paths and keeps the index storage
//! from colliding with the source tree it indexes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Default interval between incremental sync passes.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 15 * 60;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid base path {0:?}: {1}")]
    InvalidBasePath(PathBuf, String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Root of the advisory source tree.
    pub base_path: PathBuf,
    /// Search index storage directory. Empty or colliding with `base_path`
    /// resolves to a hidden `.index` directory beneath it.
    pub index_path: PathBuf,
    /// Document store directory. Empty resolves to `store` beneath the base.
    pub store_path: PathBuf,
    /// File names to skip entirely during sync.
    pub ignore_files: Vec<String>,
    /// Worker count for bulk indexing; 0 means host parallelism.
    pub workers: usize,
    /// Seconds between incremental sync passes; 0 means the default.
    pub sync_interval_secs: u64,
    /// Serve before initial indexing completes, indexing in the background.
    pub async_index: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: PathBuf::new(),
            index_path: PathBuf::new(),
            store_path: PathBuf::new(),
            ignore_files: Vec::new(),
            workers: 0,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            async_index: false,
        }
    }
}

impl Config {
    /// Read configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read(path)?;
        let config = serde_json::from_slice(&raw)?;
        Ok(config)
    }

    /// Validate the base path and resolve defaults and collisions.
    ///
    /// The index path must never equal the base path, otherwise the index
    /// would index its own storage; a colliding configuration is relocated
    /// to `<base>/.index` rather than rejected.
    pub fn normalize(mut self) -> Result<Self, ConfigError> {
        if self.base_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidBasePath(
                self.base_path,
                "base path must be set".to_string(),
            ));
        }
        self.base_path = absolutize(&self.base_path)?;
        if !self.base_path.is_dir() {
            return Err(ConfigError::InvalidBasePath(
                self.base_path,
                "not an existing directory".to_string(),
            ));
        }

        if self.index_path.as_os_str().is_empty() {
            self.index_path = self.base_path.join(".index");
            info!(path = ?self.index_path, "index path not set, using default");
        } else {
            self.index_path = absolutize(&self.index_path)?;
            if self.index_path == self.base_path {
                self.index_path = self.base_path.join(".index");
                info!(
                    path = ?self.index_path,
                    "index path matches base path, relocating index storage"
                );
            }
        }

        if self.store_path.as_os_str().is_empty() {
            self.store_path = self.base_path.join("store");
            info!(path = ?self.store_path, "store path not set, using default");
        } else {
            self.store_path = absolutize(&self.store_path)?;
        }

        Ok(self)
    }

    /// Interval between sync passes, falling back to the default for 0.
    pub fn sync_interval(&self) -> Duration {
        let secs = if self.sync_interval_secs == 0 {
            DEFAULT_SYNC_INTERVAL_SECS
        } else {
            self.sync_interval_secs
        };
        Duration::from_secs(secs)
    }

    /// Bulk-indexing worker count, falling back to host parallelism for 0.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

fn absolutize(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}
