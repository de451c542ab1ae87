//! Crate-level error type.
//!
//! Only startup-shaped failures surface as errors: opening the cache store,
//! installing a filesystem watch, reading a directory. Per-item failures
//! (a corrupt image, a failed row write) deliberately never become `Err` —
//! they degrade to an empty payload or a soft-disabled store so one bad
//! file can never take the session down.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The cache database could not be opened or its schema created.
    #[error("cache store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The filesystem watcher could not be created or a watch installed.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// An I/O failure outside per-item work: the store directory could not
    /// be created, or a directory scan failed outright.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
