//! # advisory-types
//!
//! Shared domain types for the advisory index:
//! - [`Advisory`]: one CVE Record Format 5.x advisory
//! - [`FileMeta`]: per-source-file change-detection record
//! - [`Config`]: process configuration with path normalization
//! - [`BoundedMinHeap`]: size-capped top-K selection while streaming

pub mod advisory;
pub mod config;
pub mod file_meta;
pub mod top_n;

pub use advisory::{Advisory, AdvisoryMetadata, Containers};
pub use config::{Config, ConfigError, DEFAULT_SYNC_INTERVAL_SECS};
pub use file_meta::FileMeta;
pub use top_n::BoundedMinHeap;
