//! Error types for corpus mutations.
//!
//! The variant tells the caller which side of a dual write failed: a
//! `Store` error from `put` means the corpus is unchanged, while a
//! `Search` error from `put` means the document is stored but not yet
//! searchable (and symmetrically for `delete`).

use advisory_search::SearchError;
use advisory_store::StoreError;
use thiserror::Error;

/// Errors that can occur in the index manager.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Document store operation failed
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Search index operation failed
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Document bytes could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

impl IndexError {
    /// Whether this is a plain missing-document error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexError::Store(StoreError::NotFound(_)))
    }
}
