//! Error types for vault operations

use thiserror::Error;

/// Errors that can occur during vault operations
///
/// The read path and the write path are deliberately asymmetric:
/// `ReadCorruption` is logged and degraded to an empty collection by the
/// callers that produce it, while `PersistenceFailure` is always surfaced.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("envelope failed authentication or is malformed")]
    IntegrityFailure,

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("stored data is corrupted: {0}")]
    ReadCorruption(String),

    #[error("Invalid email or password")]
    AuthenticationFailure,

    #[error("An account with this email already exists")]
    AccountExists,

    #[error("clipboard failure: {0}")]
    ClipboardFailure(String),

    #[error("key derivation error: {0}")]
    KeyDerivationError(String),

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type VaultResult<T> = Result<T, VaultError>;
