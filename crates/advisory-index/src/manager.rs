//! The index manager: dual-write discipline and the recency query.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use advisory_search::{SearchIndex, SearchResults};
use advisory_store::{Store, StoreError};
use advisory_types::{Advisory, BoundedMinHeap, FileMeta};

use crate::error::IndexError;

/// Default result cap for the recency query.
const DEFAULT_LIST_LIMIT: usize = 50;

/// Outcome of a reconciliation sweep between store and index.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Stored documents that were missing from the index and re-indexed.
    pub reindexed: u64,
    /// Index entries with no backing document, removed from the index.
    pub removed: u64,
    /// Stored documents skipped because their bytes no longer parse.
    pub skipped: u64,
}

/// Single point of mutation for the advisory corpus.
///
/// Every `put` writes the store first and the index second; every `delete`
/// removes from the index first and the store second. The two writes are
/// not transactional: a partial failure surfaces as a typed error, and
/// [`IndexManager::reconcile`] is the documented recovery path (the store
/// is authoritative).
pub struct IndexManager {
    store: Arc<Store>,
    search: SearchIndex,
}

impl IndexManager {
    pub fn new(store: Arc<Store>, search: SearchIndex) -> Self {
        Self { store, search }
    }

    /// Open (or create) both the store and the search index.
    ///
    /// Failure here is fatal to startup; there is no degraded mode with
    /// only one side available.
    pub fn open(store_path: &Path, index_path: &Path) -> Result<Self, IndexError> {
        let store = Arc::new(Store::open(store_path)?);
        let search = SearchIndex::open_or_create(index_path)?;
        Ok(Self::new(store, search))
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    // ==================== Corpus Mutation ====================

    /// Store a document, then make it searchable.
    ///
    /// A `Store` error leaves the corpus unchanged. A `Search` error means
    /// the document is stored but not discoverable until the next
    /// reconcile or reindex.
    pub fn put(&self, id: &str, advisory: &Advisory) -> Result<(), IndexError> {
        let bytes = serde_json::to_vec(advisory)?;
        self.store.put_document(id, &bytes)?;
        self.search.index_advisory(id, advisory)?;
        Ok(())
    }

    /// Remove a document from the index, then from the store.
    ///
    /// A `Search` error retains the store entry (the document stays
    /// discoverable and fetchable). A `Store` error after the index delete
    /// leaves an unsearchable stored document, repaired by reconcile.
    pub fn delete(&self, id: &str) -> Result<(), IndexError> {
        self.search.delete(id)?;
        self.store.delete_document(id)?;
        Ok(())
    }

    // ==================== Queries ====================

    /// Raw stored bytes for a document id. Does not consult the index.
    pub fn get(&self, id: &str) -> Result<Vec<u8>, IndexError> {
        Ok(self.store.get_document(id)?)
    }

    /// Stored document decoded into an advisory.
    pub fn get_advisory(&self, id: &str) -> Result<Advisory, IndexError> {
        let bytes = self.get(id)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Search the index; hit bodies are resolved via [`IndexManager::get`].
    pub fn search(&self, query: &str, limit: usize) -> Result<SearchResults, IndexError> {
        Ok(self.search.search(query, limit)?)
    }

    /// Number of discoverable documents (the index's view, which can
    /// diverge from the store count under partial-write failures).
    pub fn count(&self) -> Result<u64, IndexError> {
        Ok(self.search.count()?)
    }

    /// Up to `limit` advisories ordered by publish date, newest first.
    /// A limit of 0 means the default of 50.
    ///
    /// Prefers the index's sorted-limited query; if that query itself
    /// fails, falls back to streaming the store through a bounded min-heap
    /// so memory stays O(limit). Individual hits with missing or
    /// unparsable bodies are skipped, not errors.
    pub fn list_latest(&self, limit: usize) -> Result<Vec<Advisory>, IndexError> {
        let limit = if limit == 0 { DEFAULT_LIST_LIMIT } else { limit };

        match self.search.latest(limit) {
            Ok(ids) => {
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    match self.get_advisory(&id) {
                        Ok(advisory) => out.push(advisory),
                        Err(e) => {
                            warn!(id, error = %e, "Skipping hit with unreadable body");
                        }
                    }
                }
                Ok(out)
            }
            Err(e) => {
                warn!(error = %e, "Sorted query failed, scanning store");
                self.latest_from_store(limit)
            }
        }
    }

    /// Fallback recency query: stream every stored document through a
    /// bounded min-heap keyed by publish date.
    fn latest_from_store(&self, limit: usize) -> Result<Vec<Advisory>, IndexError> {
        let mut heap: BoundedMinHeap<DateTime<Utc>, Advisory> = BoundedMinHeap::new(limit);

        self.store.for_each_document(|id, bytes| {
            match serde_json::from_slice::<Advisory>(bytes) {
                Ok(advisory) => heap.push(advisory.published_at(), advisory),
                Err(e) => debug!(id, error = %e, "Skipping unparsable stored document"),
            }
            Ok(())
        })?;

        Ok(heap.into_descending())
    }

    // ==================== Introspection ====================

    /// Names of the fields present in the search schema.
    pub fn fields(&self) -> Vec<String> {
        self.search.field_names()
    }

    /// The search schema serialized as JSON.
    pub fn mapping_json(&self) -> Result<String, IndexError> {
        Ok(self.search.mapping_json()?)
    }

    // ==================== Recovery ====================

    /// Discard the search index contents (not the store) and rebuild from
    /// stored bytes. Documents that no longer parse are logged and
    /// skipped. Returns the number of documents re-indexed.
    pub fn reindex(&self) -> Result<u64, IndexError> {
        info!("Rebuilding search index from store");
        self.search.clear()?;

        let mut indexed = 0u64;
        let mut skipped = 0u64;
        let mut index_failure: Option<IndexError> = None;

        let scan = self.store.for_each_document(|id, bytes| {
            let advisory: Advisory = match serde_json::from_slice(bytes) {
                Ok(a) => a,
                Err(e) => {
                    warn!(id, error = %e, "Skipping unparsable stored document");
                    skipped += 1;
                    return Ok(());
                }
            };
            if let Err(e) = self.search.index_advisory(id, &advisory) {
                index_failure = Some(e.into());
                return Err(StoreError::Serialization("reindex aborted".to_string()));
            }
            indexed += 1;
            Ok(())
        });

        if let Some(e) = index_failure {
            return Err(e);
        }
        scan?;

        info!(indexed, skipped, "Reindex complete");
        Ok(indexed)
    }

    /// Reconciliation sweep comparing store and index key sets.
    ///
    /// The store is authoritative: stored documents missing from the index
    /// are re-indexed, and index entries with no backing document are
    /// removed. Repairs the partial states a failed dual write leaves
    /// behind.
    pub fn reconcile(&self) -> Result<ReconcileReport, IndexError> {
        let mut store_ids = HashSet::new();
        self.store.for_each_document(|id, _| {
            store_ids.insert(id.to_string());
            Ok(())
        })?;
        let index_ids: HashSet<String> = self.search.all_ids()?.into_iter().collect();

        let mut report = ReconcileReport::default();

        for id in store_ids.difference(&index_ids) {
            let bytes = self.store.get_document(id)?;
            match serde_json::from_slice::<Advisory>(&bytes) {
                Ok(advisory) => {
                    self.search.index_advisory(id, &advisory)?;
                    report.reindexed += 1;
                }
                Err(e) => {
                    warn!(id, error = %e, "Stored document no longer parses, leaving unindexed");
                    report.skipped += 1;
                }
            }
        }

        for id in index_ids.difference(&store_ids) {
            self.search.delete(id)?;
            report.removed += 1;
        }

        if report != ReconcileReport::default() {
            info!(
                reindexed = report.reindexed,
                removed = report.removed,
                skipped = report.skipped,
                "Reconciled store and index"
            );
        }
        Ok(report)
    }

    // ==================== File Metadata Passthrough ====================

    /// Record change-detection metadata for a source file.
    pub fn set_file_meta(&self, path: &str, meta: &FileMeta) -> Result<(), IndexError> {
        Ok(self.store.put_file_meta(path, meta)?)
    }

    /// Look up change-detection metadata for a source file.
    pub fn file_meta(&self, path: &str) -> Result<FileMeta, IndexError> {
        Ok(self.store.file_meta(path)?)
    }

    /// Drop change-detection metadata for a source file.
    pub fn delete_file_meta(&self, path: &str) -> Result<(), IndexError> {
        Ok(self.store.delete_file_meta(path)?)
    }

    /// Visit every file-metadata entry.
    pub fn for_each_file_meta<F>(&self, f: F) -> Result<(), IndexError>
    where
        F: FnMut(&str, FileMeta) -> Result<(), StoreError>,
    {
        Ok(self.store.for_each_file_meta(f)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_advisory(cve_id: &str, day: u32) -> Advisory {
        let mut advisory = Advisory::default();
        advisory.cve_metadata.cve_id = cve_id.to_string();
        advisory.cve_metadata.date_published =
            Some(Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap());
        advisory.containers.cna.title = format!("Vulnerability {cve_id}");
        advisory
    }

    fn setup() -> (TempDir, IndexManager) {
        let tmp = TempDir::new().unwrap();
        let manager =
            IndexManager::open(&tmp.path().join("store"), &tmp.path().join("index")).unwrap();
        (tmp, manager)
    }

    #[test]
    fn put_then_get_roundtrips() {
        let (_tmp, manager) = setup();

        let advisory = sample_advisory("CVE-2024-0001", 1);
        manager.put("CVE-2024-0001.json", &advisory).unwrap();

        let back = manager.get_advisory("CVE-2024-0001.json").unwrap();
        assert_eq!(back, advisory);
        assert_eq!(manager.count().unwrap(), 1);
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_tmp, manager) = setup();
        let err = manager.get("missing.json").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn put_same_id_overwrites_both_sides() {
        let (_tmp, manager) = setup();

        manager
            .put("a.json", &sample_advisory("CVE-2024-0001", 1))
            .unwrap();
        let updated = sample_advisory("CVE-2024-0001", 2);
        manager.put("a.json", &updated).unwrap();

        assert_eq!(manager.count().unwrap(), 1);
        assert_eq!(manager.get_advisory("a.json").unwrap(), updated);
    }

    #[test]
    fn delete_removes_from_both_sides() {
        let (_tmp, manager) = setup();

        manager
            .put("a.json", &sample_advisory("CVE-2024-0001", 1))
            .unwrap();
        manager.delete("a.json").unwrap();

        assert_eq!(manager.count().unwrap(), 0);
        assert!(manager.get("a.json").is_err());
    }

    #[test]
    fn search_finds_by_cve_id() {
        let (_tmp, manager) = setup();

        manager
            .put("a.json", &sample_advisory("CVE-2024-0001", 1))
            .unwrap();
        let results = manager.search("cve_id:CVE-2024-0001", 10).unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.hits[0].id, "a.json");
    }

    #[test]
    fn list_latest_returns_newest_first() {
        let (_tmp, manager) = setup();

        // Five documents published on days 1..=5; top 3 is days 5, 4, 3.
        for day in 1..=5u32 {
            manager
                .put(
                    &format!("doc-{day}.json"),
                    &sample_advisory(&format!("CVE-2024-000{day}"), day),
                )
                .unwrap();
        }

        let latest = manager.list_latest(3).unwrap();
        let ids: Vec<&str> = latest.iter().map(|a| a.cve_metadata.cve_id.as_str()).collect();
        assert_eq!(ids, vec!["CVE-2024-0005", "CVE-2024-0004", "CVE-2024-0003"]);
    }

    #[test]
    fn list_latest_zero_means_default_limit() {
        let (_tmp, manager) = setup();

        for day in 1..=3u32 {
            manager
                .put(
                    &format!("doc-{day}.json"),
                    &sample_advisory(&format!("CVE-2024-000{day}"), day),
                )
                .unwrap();
        }

        let latest = manager.list_latest(0).unwrap();
        assert_eq!(latest.len(), 3);
        assert_eq!(latest[0].cve_metadata.cve_id, "CVE-2024-0003");
    }

    #[test]
    fn list_latest_skips_hits_with_missing_bodies() {
        let (_tmp, manager) = setup();

        manager
            .put("a.json", &sample_advisory("CVE-2024-0001", 1))
            .unwrap();
        manager
            .put("b.json", &sample_advisory("CVE-2024-0002", 2))
            .unwrap();
        // Break the dual-write invariant behind the manager's back.
        manager.store.delete_document("b.json").unwrap();

        let latest = manager.list_latest(10).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].cve_metadata.cve_id, "CVE-2024-0001");
    }

    #[test]
    fn fallback_scan_matches_sorted_query() {
        let (_tmp, manager) = setup();

        for day in 1..=5u32 {
            manager
                .put(
                    &format!("doc-{day}.json"),
                    &sample_advisory(&format!("CVE-2024-000{day}"), day),
                )
                .unwrap();
        }

        let fast: Vec<String> = manager
            .list_latest(3)
            .unwrap()
            .into_iter()
            .map(|a| a.cve_metadata.cve_id)
            .collect();
        let slow: Vec<String> = manager
            .latest_from_store(3)
            .unwrap()
            .into_iter()
            .map(|a| a.cve_metadata.cve_id)
            .collect();
        assert_eq!(fast, slow);
    }

    #[test]
    fn reindex_rebuilds_from_store() {
        let (_tmp, manager) = setup();

        for day in 1..=2u32 {
            manager
                .put(
                    &format!("doc-{day}.json"),
                    &sample_advisory(&format!("CVE-2024-000{day}"), day),
                )
                .unwrap();
        }
        // A stored document whose bytes no longer parse is skipped.
        manager
            .store
            .put_document("broken.json", b"not json at all")
            .unwrap();

        let indexed = manager.reindex().unwrap();
        assert_eq!(indexed, 2);
        assert_eq!(manager.count().unwrap(), 2);
    }

    #[test]
    fn reconcile_repairs_both_directions() {
        let (_tmp, manager) = setup();

        // Stored but never indexed (a failed put's aftermath).
        let orphan = sample_advisory("CVE-2024-0001", 1);
        manager
            .store
            .put_document("orphan.json", &serde_json::to_vec(&orphan).unwrap())
            .unwrap();

        // Indexed but no longer stored (a failed delete's aftermath).
        manager
            .put("dangling.json", &sample_advisory("CVE-2024-0002", 2))
            .unwrap();
        manager.store.delete_document("dangling.json").unwrap();

        let report = manager.reconcile().unwrap();
        assert_eq!(report.reindexed, 1);
        assert_eq!(report.removed, 1);

        assert_eq!(manager.count().unwrap(), 1);
        assert_eq!(manager.search("cve_id:CVE-2024-0001", 10).unwrap().total, 1);
        assert_eq!(manager.search("cve_id:CVE-2024-0002", 10).unwrap().total, 0);
    }

    #[test]
    fn reconcile_clean_corpus_is_a_noop() {
        let (_tmp, manager) = setup();

        manager
            .put("a.json", &sample_advisory("CVE-2024-0001", 1))
            .unwrap();
        let report = manager.reconcile().unwrap();
        assert_eq!(report, ReconcileReport::default());
    }

    #[test]
    fn file_meta_passthrough() {
        let (_tmp, manager) = setup();

        let meta = FileMeta {
            mod_time: 42,
            size: 7,
            doc_id: "a.json".to_string(),
        };
        manager.set_file_meta("/data/a.json", &meta).unwrap();
        assert_eq!(manager.file_meta("/data/a.json").unwrap(), meta);

        let mut count = 0;
        manager
            .for_each_file_meta(|_, _| {
                count += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 1);

        manager.delete_file_meta("/data/a.json").unwrap();
        assert!(manager.file_meta("/data/a.json").is_err());
    }

    #[test]
    fn introspection_exposes_schema() {
        let (_tmp, manager) = setup();
        assert!(manager.fields().contains(&"published".to_string()));
        assert!(manager.mapping_json().unwrap().contains("published"));
    }
}
