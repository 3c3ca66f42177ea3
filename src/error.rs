//! Error types for fatvol
//!
//! Provides a unified error type for all volume operations.

use thiserror::Error;

/// Result type alias using VolumeError
pub type Result<T> = std::result::Result<T, VolumeError>;

/// Unified error type for fatvol operations
#[derive(Debug, Error)]
pub enum VolumeError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt volume image: {0}")]
    CorruptImage(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Configuration(String),

    // -------------------------------------------------------------------------
    // Directory Errors
    // -------------------------------------------------------------------------
    #[error("File '{0}' already exists")]
    AlreadyExists(String),

    #[error("File '{0}' not found")]
    NotFound(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Directory full: all {capacity} entries are in use")]
    DirectoryFull { capacity: usize },

    // -------------------------------------------------------------------------
    // Allocation Errors
    // -------------------------------------------------------------------------
    #[error("Insufficient space: need {needed} blocks, {available} free")]
    InsufficientSpace { needed: usize, available: usize },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),
}
