//! # advisory-index
//!
//! Single point of mutation for the advisory corpus.
//!
//! [`IndexManager`] composes the durable document store and the search
//! index behind one API and owns the dual-write/dual-delete ordering
//! between them, the bounded recency query, and the recovery paths
//! (reindex and reconcile) for when the two sides drift.

pub mod error;
pub mod manager;

pub use error::IndexError;
pub use manager::{IndexManager, ReconcileReport};

// Callers iterating file metadata name this error type in their closures.
pub use advisory_store::StoreError;
