//! Error types for STASH operations

use thiserror::Error;

/// Configuration errors, surfaced at store-acquisition time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("store \"{store}\" must be defined in schema \"{schema}\"")]
    StoreNotInSchema { store: String, schema: String },

    #[error("store \"{key}\" is already registered with a different item type")]
    StoreTypeMismatch { key: String },

    #[error("invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Storage layer errors.
///
/// Capability absence (no persistent storage in this environment) is NOT
/// represented here: it is the silent no-op path, not an error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("failed to open database \"{name}\": {reason}")]
    OpenFailed { name: String, reason: String },

    #[error("transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    #[error("deserialization error: {reason}")]
    Deserialization { reason: String },

    #[error("storage lock poisoned")]
    LockPoisoned,
}

/// Master error type for all STASH errors.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for STASH operations.
pub type CacheResult<T> = Result<T, CacheError>;
