//! RocksDB wrapper for advisory storage.
//!
//! Provides point get/put/delete and full-scan iteration over the document
//! mapping and the file-metadata mapping. Each operation is its own atomic
//! unit; there is no cross-document transaction.

use std::path::Path;

use rocksdb::{ColumnFamily, IteratorMode, Options, DB};
use tracing::{debug, info};

use advisory_types::FileMeta;

use crate::column_families::{build_cf_descriptors, CF_ADVISORIES, CF_FILE_META};
use crate::error::StoreError;

/// Durable key-value storage for advisory documents and file metadata.
///
/// Safe for concurrent readers while the sync engine writes; RocksDB
/// provides the multiple-readers/single-logical-writer discipline.
pub struct Store {
    db: DB,
}

impl Store {
    /// Open storage at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("Opening store at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(name.to_string()))
    }

    // ==================== Document Methods ====================

    /// Store a document's raw bytes under its identifier, replacing any
    /// previous version wholesale.
    pub fn put_document(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let cf = self.cf(CF_ADVISORIES)?;
        self.db.put_cf(&cf, id.as_bytes(), bytes)?;
        debug!(id, len = bytes.len(), "Stored document");
        Ok(())
    }

    /// Fetch a document's raw bytes by identifier.
    pub fn get_document(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let cf = self.cf(CF_ADVISORIES)?;
        self.db
            .get_cf(&cf, id.as_bytes())?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Delete a document by identifier. Deleting an absent id is a no-op.
    pub fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        let cf = self.cf(CF_ADVISORIES)?;
        self.db.delete_cf(&cf, id.as_bytes())?;
        debug!(id, "Deleted document");
        Ok(())
    }

    /// Run `f` for every stored document. The callback's error stops the
    /// scan and is returned.
    pub fn for_each_document<F>(&self, mut f: F) -> Result<(), StoreError>
    where
        F: FnMut(&str, &[u8]) -> Result<(), StoreError>,
    {
        let cf = self.cf(CF_ADVISORIES)?;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            let id = String::from_utf8_lossy(&key);
            f(&id, &value)?;
        }
        Ok(())
    }

    /// Number of stored documents. Linear scan; used by reconciliation and
    /// tests, not the serving path.
    pub fn document_count(&self) -> Result<u64, StoreError> {
        let cf = self.cf(CF_ADVISORIES)?;
        let mut count = 0u64;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    // ==================== File Metadata Methods ====================

    /// Store change-detection metadata for a source file path.
    pub fn put_file_meta(&self, path: &str, meta: &FileMeta) -> Result<(), StoreError> {
        let cf = self.cf(CF_FILE_META)?;
        let bytes = serde_json::to_vec(meta)?;
        self.db.put_cf(&cf, path.as_bytes(), bytes)?;
        Ok(())
    }

    /// Fetch metadata for a source file path.
    pub fn file_meta(&self, path: &str) -> Result<FileMeta, StoreError> {
        let cf = self.cf(CF_FILE_META)?;
        let bytes = self
            .db
            .get_cf(&cf, path.as_bytes())?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let meta = serde_json::from_slice(&bytes)?;
        Ok(meta)
    }

    /// Remove metadata for a source file path.
    pub fn delete_file_meta(&self, path: &str) -> Result<(), StoreError> {
        let cf = self.cf(CF_FILE_META)?;
        self.db.delete_cf(&cf, path.as_bytes())?;
        Ok(())
    }

    /// Run `f` for every file-metadata entry.
    pub fn for_each_file_meta<F>(&self, mut f: F) -> Result<(), StoreError>
    where
        F: FnMut(&str, FileMeta) -> Result<(), StoreError>,
    {
        let cf = self.cf(CF_FILE_META)?;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            let path = String::from_utf8_lossy(&key);
            let meta: FileMeta = serde_json::from_slice(&value)
                .map_err(|e| StoreError::Serialization(format!("metadata for {path}: {e}")))?;
            f(&path, meta)?;
        }
        Ok(())
    }

    /// Flush all column families to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        for cf_name in crate::column_families::ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(&cf)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    fn sample_meta(doc_id: &str) -> FileMeta {
        FileMeta {
            mod_time: 1_700_000_000_000_000_000,
            size: 512,
            doc_id: doc_id.to_string(),
        }
    }

    #[test]
    fn document_roundtrip() {
        let (store, _temp) = create_test_store();

        store
            .put_document("CVE-2024-0001.json", b"{\"dataType\":\"CVE_RECORD\"}")
            .unwrap();
        let bytes = store.get_document("CVE-2024-0001.json").unwrap();
        assert_eq!(bytes, b"{\"dataType\":\"CVE_RECORD\"}");
    }

    #[test]
    fn get_missing_document_is_not_found() {
        let (store, _temp) = create_test_store();
        assert!(matches!(
            store.get_document("CVE-1999-0000.json"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn put_overwrites_wholesale() {
        let (store, _temp) = create_test_store();

        store.put_document("a.json", b"v1").unwrap();
        store.put_document("a.json", b"v2").unwrap();
        assert_eq!(store.get_document("a.json").unwrap(), b"v2");
        assert_eq!(store.document_count().unwrap(), 1);
    }

    #[test]
    fn delete_document_removes_entry() {
        let (store, _temp) = create_test_store();

        store.put_document("a.json", b"v1").unwrap();
        store.delete_document("a.json").unwrap();
        assert!(store.get_document("a.json").is_err());
        assert_eq!(store.document_count().unwrap(), 0);
    }

    #[test]
    fn for_each_document_visits_all() {
        let (store, _temp) = create_test_store();

        for i in 0..3 {
            store
                .put_document(&format!("doc-{i}.json"), format!("body-{i}").as_bytes())
                .unwrap();
        }

        let mut seen = Vec::new();
        store
            .for_each_document(|id, bytes| {
                seen.push((id.to_string(), bytes.to_vec()));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn for_each_document_stops_on_callback_error() {
        let (store, _temp) = create_test_store();

        store.put_document("a.json", b"1").unwrap();
        store.put_document("b.json", b"2").unwrap();

        let mut visited = 0;
        let err = store.for_each_document(|_, _| {
            visited += 1;
            Err(StoreError::Serialization("stop".to_string()))
        });
        assert!(err.is_err());
        assert_eq!(visited, 1);
    }

    #[test]
    fn file_meta_roundtrip() {
        let (store, _temp) = create_test_store();

        let meta = sample_meta("CVE-2024-0001.json");
        store.put_file_meta("/data/CVE-2024-0001.json", &meta).unwrap();
        assert_eq!(store.file_meta("/data/CVE-2024-0001.json").unwrap(), meta);

        store.delete_file_meta("/data/CVE-2024-0001.json").unwrap();
        assert!(matches!(
            store.file_meta("/data/CVE-2024-0001.json"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn file_meta_iteration() {
        let (store, _temp) = create_test_store();

        store.put_file_meta("/data/a.json", &sample_meta("a.json")).unwrap();
        store.put_file_meta("/data/b.json", &sample_meta("b.json")).unwrap();

        let mut paths = Vec::new();
        store
            .for_each_file_meta(|path, meta| {
                assert!(!meta.doc_id.is_empty());
                paths.push(path.to_string());
                Ok(())
            })
            .unwrap();
        paths.sort();
        assert_eq!(paths, vec!["/data/a.json", "/data/b.json"]);
    }

    #[test]
    fn mappings_are_isolated() {
        let (store, _temp) = create_test_store();

        // Same key in both column families must not collide.
        store.put_document("shared", b"doc").unwrap();
        store.put_file_meta("shared", &sample_meta("shared")).unwrap();

        store.delete_file_meta("shared").unwrap();
        assert_eq!(store.get_document("shared").unwrap(), b"doc");
    }

    #[test]
    fn reopen_preserves_data() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = Store::open(temp_dir.path()).unwrap();
            store.put_document("a.json", b"persisted").unwrap();
            store.flush().unwrap();
        }
        let store = Store::open(temp_dir.path()).unwrap();
        assert_eq!(store.get_document("a.json").unwrap(), b"persisted");
    }
}
