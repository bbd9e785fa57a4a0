//! Tantivy index lifecycle and write operations.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Term};
use tracing::{debug, info};

use advisory_types::Advisory;

use crate::document::advisory_to_doc;
use crate::error::SearchError;
use crate::schema::{build_advisory_schema, AdvisorySchema};

/// Memory budget for the IndexWriter (50MB).
const WRITER_MEMORY_BYTES: usize = 50 * 1024 * 1024;

/// Searchable projection of the document corpus.
///
/// Owns the writer (serialized behind a mutex) and a manually reloaded
/// reader, so reads always observe the latest commit. Writes commit per
/// operation: each add/update/delete is immediately visible, matching the
/// one-operation-one-atomic-unit contract of the store.
pub struct SearchIndex {
    index: Index,
    schema: AdvisorySchema,
    writer: Mutex<IndexWriter>,
    pub(crate) reader: IndexReader,
    path: PathBuf,
}

impl SearchIndex {
    /// Open an existing index or create a new one at `path`.
    pub fn open_or_create(path: &Path) -> Result<Self, SearchError> {
        let index = if path.join("meta.json").exists() {
            debug!(path = ?path, "Opening existing search index");
            Index::open_in_dir(path)?
        } else {
            info!(path = ?path, "Creating new search index");
            std::fs::create_dir_all(path)?;
            let schema = build_advisory_schema();
            Index::create_in_dir(path, schema.schema().clone())?
        };

        let schema = AdvisorySchema::from_schema(index.schema())?;
        let writer = index.writer(WRITER_MEMORY_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            schema,
            writer: Mutex::new(writer),
            reader,
            path: path.to_path_buf(),
        })
    }

    /// Get the advisory schema.
    pub fn schema(&self) -> &AdvisorySchema {
        &self.schema
    }

    /// Get the underlying Tantivy index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Get the index storage path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, IndexWriter>, SearchError> {
        self.writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))
    }

    /// Add or replace an advisory in the index.
    ///
    /// Any existing document with the same id is removed in the same commit.
    pub fn index_advisory(&self, id: &str, advisory: &Advisory) -> Result<(), SearchError> {
        let doc = advisory_to_doc(&self.schema, id, advisory);

        let mut writer = self.lock_writer()?;
        writer.delete_term(Term::from_field_text(self.schema.id, id));
        writer.add_document(doc)?;
        writer.commit()?;

        debug!(id, "Indexed advisory");
        Ok(())
    }

    /// Remove an advisory from the index. Removing an absent id is a no-op.
    pub fn delete(&self, id: &str) -> Result<(), SearchError> {
        let mut writer = self.lock_writer()?;
        writer.delete_term(Term::from_field_text(self.schema.id, id));
        writer.commit()?;

        debug!(id, "Deleted advisory from index");
        Ok(())
    }

    /// Discard every indexed document, keeping the schema.
    ///
    /// Used by reindexing: the projection is cheap to rebuild from the
    /// store, so a full clear is the recovery path for index-side drift.
    pub fn clear(&self) -> Result<(), SearchError> {
        let mut writer = self.lock_writer()?;
        writer.delete_all_documents()?;
        writer.commit()?;

        info!(path = ?self.path, "Cleared search index");
        Ok(())
    }
}
