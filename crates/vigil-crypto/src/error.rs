//! Cryptographic error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while handling keys and signatures.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Invalid signature length.
    #[error("invalid signature length: expected {expected}, got {actual}")]
    InvalidSignatureLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// The bytes do not describe a valid Ed25519 point.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Signature verification failed.
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid hex encoding.
    #[error("invalid hex encoding")]
    InvalidHexEncoding,

    /// Invalid base64 encoding.
    #[error("invalid base64 encoding")]
    InvalidBase64Encoding,

    /// A key file could not be read or written.
    #[error("key file {}: {reason}", path.display())]
    KeyFile {
        /// The offending path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}

impl CryptoError {
    pub(crate) fn key_file(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::KeyFile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
