//! Durable document storage for the advisory index.
//!
//! RocksDB-backed, with column family isolation between the two mappings:
//! - `advisories`: document id -> advisory JSON bytes
//! - `filemeta`: source file path -> change-detection metadata

pub mod column_families;
pub mod db;
pub mod error;

pub use db::Store;
pub use error::StoreError;
