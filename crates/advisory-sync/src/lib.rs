//! Keeps the advisory corpus in step with a directory of CVE JSON files.
//!
//! [`SyncEngine`] walks the source tree, uses stored file metadata to skip
//! unchanged files, and removes documents whose source files are gone.
//! [`WorkerPool`] bounds the concurrency of the initial bulk indexing pass.

pub mod engine;
pub mod error;
pub mod pool;

pub use engine::{SyncEngine, SyncReport};
pub use error::SyncError;
pub use pool::{Task, TaskResult, WorkerPool};
