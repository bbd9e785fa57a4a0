//! Column family definitions for RocksDB.
//!
//! Documents and file metadata have different access patterns (bulk scans
//! during reindex vs small point lookups during sync), so each gets its own
//! column family.

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family for advisory documents (id -> JSON bytes).
pub const CF_ADVISORIES: &str = "advisories";

/// Column family for per-file change-detection metadata (path -> FileMeta).
pub const CF_FILE_META: &str = "filemeta";

/// All column family names.
pub const ALL_CF_NAMES: &[&str] = &[CF_ADVISORIES, CF_FILE_META];

fn advisories_options() -> Options {
    let mut opts = Options::default();
    // Documents are written whole and rewritten rarely; compress them.
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors.
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_ADVISORIES, advisories_options()),
        ColumnFamilyDescriptor::new(CF_FILE_META, Options::default()),
    ]
}
