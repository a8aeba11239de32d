//! Error types for caskstore
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using CaskError
pub type Result<T> = std::result::Result<T, CaskError>;

/// Unified error type for caskstore operations
#[derive(Debug, Error)]
pub enum CaskError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Directory Errors
    // -------------------------------------------------------------------------
    #[error("Invalid store directory {path}: {reason}")]
    Directory { path: PathBuf, reason: String },

    #[error("Store directory {0} is locked by another read-write handle")]
    Locked(PathBuf),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Recovery failed for {path}: {reason}")]
    Recovery { path: PathBuf, reason: String },

    #[error("Merge failed: {0}")]
    Merge(String),

    #[error("handle has no write permission")]
    ReadOnly,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CaskError {
    /// Wrap any error hit while replaying `path` into a fatal recovery error
    pub(crate) fn recovery(path: impl Into<PathBuf>, err: CaskError) -> Self {
        CaskError::Recovery {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}
