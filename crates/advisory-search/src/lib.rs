//! # advisory-search
//!
//! Full-text and structured search over advisory documents using Tantivy.
//!
//! The index is a searchable projection of the document store, never the
//! source of truth: documents flow in through add/update and delete, and
//! the whole projection can be discarded and rebuilt from stored bytes.
//!
//! ## Features
//! - Embedded Tantivy index with MmapDirectory for persistence
//! - Query-parser search (free text and `field:value` lookups) with totals
//! - Match-all query sorted descending by publish date with a result limit,
//!   backed by a fast date field
//! - Schema/field introspection for callers

pub mod document;
pub mod error;
pub mod index;
pub mod schema;
pub mod searcher;

pub use document::advisory_to_doc;
pub use error::SearchError;
pub use index::SearchIndex;
pub use schema::{build_advisory_schema, AdvisorySchema};
pub use searcher::{SearchHit, SearchResults};
