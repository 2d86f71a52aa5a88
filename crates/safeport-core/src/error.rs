//! Error types for safeport-core

use thiserror::Error;

/// Result type alias for SafePort operations
pub type Result<T> = std::result::Result<T, SafePortError>;

/// SafePort error types
#[derive(Error, Debug)]
pub enum SafePortError {
    /// Container shorter than the fixed salt + nonce header, or otherwise
    /// structurally invalid.
    #[error("Invalid encrypted file: {0}")]
    MalformedContainer(String),

    /// AEAD tag verification failed. Deliberately carries no detail.
    #[error("Incorrect password or corrupted file")]
    AuthenticationFailure,

    /// The runtime cannot provide a required cryptographic primitive.
    #[error("Cryptographic primitive unavailable: {0}")]
    PrimitiveUnavailable(String),

    #[error("Unsupported key size: {0} bits (expected 128, 192 or 256)")]
    InvalidKeySize(u32),

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Primary database could not be opened or used.
    #[error("Artifact store unavailable: {0}")]
    StoreUnavailable(String),

    /// Fallback tier refused a write because it would exceed its capacity.
    #[error("Storage quota exceeded: {needed} bytes needed, {capacity} bytes available")]
    QuotaExceeded { needed: usize, capacity: usize },

    #[error("Artifact store is closed")]
    StoreClosed,

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SafePortError {
    /// Whether retrying the same call could succeed.
    ///
    /// Missing primitives and bad containers never recover on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SafePortError::StoreUnavailable(_)
                | SafePortError::StorageError(_)
                | SafePortError::DatabaseError(_)
                | SafePortError::IoError(_)
        )
    }
}
