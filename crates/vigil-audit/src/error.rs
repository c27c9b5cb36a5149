//! Audit-related error types.

use thiserror::Error;

/// Errors that can occur with audit logging and querying.
///
/// Signature mismatches are not errors; they surface per record as
/// [`SigCheck::Fail`](crate::SigCheck::Fail).
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backing store rejected an operation.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A `timelimit` filter could not be parsed.
    #[error("invalid time limit '{value}': {reason}")]
    InvalidTimeLimit {
        /// The raw filter value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Settings handed to the factory are unusable.
    #[error("invalid audit settings: {0}")]
    InvalidSettings(String),

    /// Crypto error.
    #[error("crypto error: {0}")]
    CryptoError(#[from] vigil_crypto::CryptoError),
}

impl From<rusqlite::Error> for AuditError {
    fn from(e: rusqlite::Error) -> Self {
        Self::StorageError(e.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
