//! Error types for the goal tracker core library.

use thiserror::Error;

/// Errors that can occur while decoding, validating or exporting backups.
///
/// Merge conflicts are never reported through this type; they are part of
/// the regular [`MergeResult`](crate::backup_merge::MergeResult).
///
/// This enum is exposed to Swift/Kotlin via UniFFI as a flat error type,
/// meaning the error variants are exposed as simple enum cases with string messages.
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "uniffi", derive(uniffi::Error))]
#[cfg_attr(feature = "uniffi", uniffi(flat_error))]
pub enum BackupError {
    /// Error serializing/deserializing JSON input
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Payload decoded but breaks a model invariant
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Export serialization failed
    #[error("Export failed: {0}")]
    Export(String),
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        BackupError::JsonError(err.to_string())
    }
}

/// Result type alias for backup operations.
pub type BackupResult<T> = Result<T, BackupError>;
