//! Query operations over the advisory index.
//!
//! The reader is reloaded at the start of every query so results always
//! reflect the latest commit; this keeps search deterministic relative to
//! writes at the cost of a cheap reload check.

use tantivy::collector::{Count, TopDocs};
use tantivy::query::AllQuery;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{DocAddress, Order, Searcher, TantivyDocument};
use tracing::debug;

use crate::error::SearchError;
use crate::index::SearchIndex;

/// One search hit; callers resolve the document body through the store.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
}

/// An ordered result set with the total match count.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    /// Total number of matching documents, independent of the limit.
    pub total: usize,
    /// Hits in relevance order, capped at the request limit.
    pub hits: Vec<SearchHit>,
}

impl SearchIndex {
    fn searcher(&self) -> Result<Searcher, SearchError> {
        self.reader.reload()?;
        Ok(self.reader.searcher())
    }

    fn stored_id(&self, searcher: &Searcher, address: DocAddress) -> Result<String, SearchError> {
        let doc: TantivyDocument = searcher.doc(address)?;
        let id = doc
            .get_first(self.schema().id)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(id)
    }

    /// Search with the query-parser grammar: free text over the default
    /// fields, or exact lookups like `cve_id:CVE-2024-0001`.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<SearchResults, SearchError> {
        if query_str.trim().is_empty() {
            return Ok(SearchResults::default());
        }

        let searcher = self.searcher()?;
        let parser = QueryParser::for_index(self.index(), self.schema().default_search_fields());
        let query = parser.parse_query(query_str)?;

        let (top_docs, total) =
            searcher.search(&query, &(TopDocs::with_limit(limit.max(1)), Count))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            hits.push(SearchHit {
                id: self.stored_id(&searcher, address)?,
                score,
            });
        }

        debug!(query = query_str, total, returned = hits.len(), "Search complete");
        Ok(SearchResults { total, hits })
    }

    /// Match-all query sorted by publish date descending, capped at `limit`.
    ///
    /// Returns hit identifiers in index order; bodies live in the store.
    pub fn latest(&self, limit: usize) -> Result<Vec<String>, SearchError> {
        let searcher = self.searcher()?;

        let collector = TopDocs::with_limit(limit.max(1))
            .order_by_fast_field::<tantivy::DateTime>("published", Order::Desc);
        let top_docs = searcher.search(&AllQuery, &collector)?;

        let mut ids = Vec::with_capacity(top_docs.len());
        for (_published, address) in top_docs {
            ids.push(self.stored_id(&searcher, address)?);
        }
        Ok(ids)
    }

    /// Every indexed document id. Used by reconciliation sweeps.
    pub fn all_ids(&self) -> Result<Vec<String>, SearchError> {
        let searcher = self.searcher()?;
        let total = searcher.num_docs() as usize;
        if total == 0 {
            return Ok(Vec::new());
        }

        let top_docs = searcher.search(&AllQuery, &TopDocs::with_limit(total))?;
        let mut ids = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            ids.push(self.stored_id(&searcher, address)?);
        }
        Ok(ids)
    }

    /// Number of indexed documents.
    pub fn count(&self) -> Result<u64, SearchError> {
        Ok(self.searcher()?.num_docs())
    }

    /// Names of the fields present in the index schema.
    pub fn field_names(&self) -> Vec<String> {
        self.schema()
            .schema()
            .fields()
            .map(|(_, entry)| entry.name().to_string())
            .collect()
    }

    /// The index schema serialized as pretty JSON.
    pub fn mapping_json(&self) -> Result<String, SearchError> {
        serde_json::to_string_pretty(self.schema().schema())
            .map_err(|e| SearchError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use advisory_types::advisory::{Affected, LocalizedText};
    use advisory_types::Advisory;

    fn sample_advisory(cve_id: &str, title: &str, description: &str, days: u32) -> Advisory {
        let mut advisory = Advisory::default();
        advisory.cve_metadata.cve_id = cve_id.to_string();
        advisory.cve_metadata.date_published =
            Some(Utc.with_ymd_and_hms(2024, 6, days, 0, 0, 0).unwrap());
        advisory.containers.cna.title = title.to_string();
        advisory.containers.cna.descriptions = vec![LocalizedText {
            lang: "en".to_string(),
            value: description.to_string(),
        }];
        advisory.containers.cna.affected = vec![Affected {
            vendor: "Example".to_string(),
            product: "Widget".to_string(),
            ..Default::default()
        }];
        advisory
    }

    fn setup() -> (TempDir, SearchIndex) {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(temp_dir.path()).unwrap();
        (temp_dir, index)
    }

    #[test]
    fn free_text_search_finds_description() {
        let (_temp, index) = setup();
        index
            .index_advisory(
                "a.json",
                &sample_advisory("CVE-2024-0001", "Parser bug", "heap overflow in parser", 1),
            )
            .unwrap();
        index
            .index_advisory(
                "b.json",
                &sample_advisory("CVE-2024-0002", "Auth bypass", "missing permission check", 2),
            )
            .unwrap();

        let results = index.search("overflow", 10).unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.hits[0].id, "a.json");
        assert!(results.hits[0].score > 0.0);
    }

    #[test]
    fn exact_field_lookup() {
        let (_temp, index) = setup();
        index
            .index_advisory(
                "a.json",
                &sample_advisory("CVE-2024-0001", "Parser bug", "heap overflow", 1),
            )
            .unwrap();

        let results = index.search("cve_id:CVE-2024-0001", 10).unwrap();
        assert_eq!(results.total, 1);
        let results = index.search("cve_id:CVE-2024-9999", 10).unwrap();
        assert_eq!(results.total, 0);
    }

    #[test]
    fn bare_cve_id_matches_as_default_field() {
        let (_temp, index) = setup();
        index
            .index_advisory(
                "a.json",
                &sample_advisory("CVE-2024-0001", "Parser bug", "heap overflow", 1),
            )
            .unwrap();

        let results = index.search("CVE-2024-0001", 10).unwrap();
        assert_eq!(results.hits.len(), 1);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let (_temp, index) = setup();
        let results = index.search("   ", 10).unwrap();
        assert_eq!(results.total, 0);
        assert!(results.hits.is_empty());
    }

    #[test]
    fn search_respects_limit_but_reports_total() {
        let (_temp, index) = setup();
        for i in 1..=5 {
            index
                .index_advisory(
                    &format!("doc-{i}.json"),
                    &sample_advisory(
                        &format!("CVE-2024-000{i}"),
                        "Overflow",
                        "stack overflow bug",
                        i,
                    ),
                )
                .unwrap();
        }

        let results = index.search("overflow", 2).unwrap();
        assert_eq!(results.total, 5);
        assert_eq!(results.hits.len(), 2);
    }

    #[test]
    fn latest_orders_by_publish_date_descending() {
        let (_temp, index) = setup();
        for (id, day) in [("old.json", 1), ("mid.json", 10), ("new.json", 20)] {
            index
                .index_advisory(
                    id,
                    &sample_advisory(&format!("CVE-2024-{day:04}"), "T", "d", day),
                )
                .unwrap();
        }

        let ids = index.latest(2).unwrap();
        assert_eq!(ids, vec!["new.json", "mid.json"]);
    }

    #[test]
    fn all_ids_lists_everything() {
        let (_temp, index) = setup();
        assert!(index.all_ids().unwrap().is_empty());

        for i in 0..4 {
            index
                .index_advisory(
                    &format!("doc-{i}.json"),
                    &sample_advisory(&format!("CVE-2024-000{i}"), "T", "d", i + 1),
                )
                .unwrap();
        }

        let mut ids = index.all_ids().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["doc-0.json", "doc-1.json", "doc-2.json", "doc-3.json"]);
    }

    #[test]
    fn field_names_and_mapping() {
        let (_temp, index) = setup();
        let fields = index.field_names();
        assert!(fields.contains(&"title".to_string()));
        assert!(fields.contains(&"published".to_string()));

        let mapping = index.mapping_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&mapping).unwrap();
        assert!(parsed.is_array() || parsed.is_object());
    }
}
