//! Error types for AutoDB
//!
//! Provides a unified error type for all operations.
//!
//! The variants separate "nothing of this type was ever stored"
//! ([`AutoDbError::DatabaseNotFound`]) from "something is stored but cannot be
//! read" ([`AutoDbError::CorruptFile`], [`AutoDbError::CorruptRecord`]), so
//! callers can choose between treating a lookup as empty or as data loss.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using AutoDbError
pub type Result<T> = std::result::Result<T, AutoDbError>;

/// Unified error type for AutoDB operations
#[derive(Debug, Error)]
pub enum AutoDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Table File Errors
    // -------------------------------------------------------------------------
    #[error("No table file at {}", path.display())]
    DatabaseNotFound { path: PathBuf },

    #[error("Corrupt table file {}: {reason}", path.display())]
    CorruptFile { path: PathBuf, reason: String },

    #[error("Corrupt record at slot {slot}: {reason}")]
    CorruptRecord { slot: u64, reason: String },

    #[error("Record too large: {size} bytes (max {max})")]
    RecordTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Schema Errors
    // -------------------------------------------------------------------------
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unknown attribute '{attribute}' for type '{type_id}'")]
    UnknownAttribute { type_id: String, attribute: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Value conversion error: {0}")]
    ValueConversion(String),

    #[error("Value nested deeper than {max} levels")]
    NestingTooDeep { max: usize },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AutoDbError {
    /// True for errors that mean stored data exists but could not be read
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            AutoDbError::CorruptFile { .. } | AutoDbError::CorruptRecord { .. }
        )
    }
}

impl From<bincode::Error> for AutoDbError {
    fn from(e: bincode::Error) -> Self {
        AutoDbError::Serialization(e.to_string())
    }
}
