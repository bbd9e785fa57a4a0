//! Change-detection metadata for indexed source files.

use serde::{Deserialize, Serialize};

/// Per-file record used to decide whether a source file is stale.
///
/// An entry exists if and only if the sync engine has successfully indexed
/// the file at exactly this `(mod_time, size)` pair. Staleness is decided
/// from this record alone, never inferred from store contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    /// Modification time in nanoseconds since the Unix epoch.
    pub mod_time: i64,
    /// File size in bytes.
    pub size: i64,
    /// Document identifier produced from this file.
    pub doc_id: String,
}
