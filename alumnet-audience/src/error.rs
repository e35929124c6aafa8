//! Error types for the audience subsystem
//!
//! None of these ever reach the host page: callers log them and degrade.

use thiserror::Error;

/// Backing storage failures
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage is disabled or inaccessible (private mode, sandboxed frame)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Write would exceed the storage quota
    #[error("Storage quota exceeded writing {key:?}: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    /// File-backed storage I/O error
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized or the backing file is corrupt
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Host analytics dispatch failures
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Dispatch function rejected the event
    #[error("Analytics dispatch failed: {0}")]
    Dispatch(String),
}
