//! Error types for redis3 operations

use thiserror::Error;

/// Failures reported by an object storage backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Backend rejected request ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Caller-side contract violations, detected before or without backend I/O.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid value type for key {key}: {reason}")]
    InvalidValueType { key: String, reason: String },

    #[error("Length mismatch: {keys} keys but {values} values")]
    LengthMismatch { keys: usize, values: usize },

    #[error("Invalid database number {value:?}: {reason}")]
    InvalidDatabaseNumber { value: String, reason: String },
}

/// Flat classification of every [`Redis3Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ProvisioningFailed,
    InvalidValueType,
    BackendWriteFailed,
    BackendReadFailed,
    BackendDeleteFailed,
    LengthMismatch,
    InvalidDatabaseNumber,
    BackendUnavailable,
    CorruptObjectKey,
    BatchFailed,
    RuntimeUnavailable,
}

/// Master error type for all redis3 client errors.
#[derive(Debug, Clone, Error)]
pub enum Redis3Error {
    #[error("Provisioning bucket {container} failed: {source}")]
    ProvisioningFailed {
        container: String,
        source: StorageError,
    },

    #[error("Write of {object_key} failed: {source}")]
    BackendWriteFailed {
        object_key: String,
        source: StorageError,
    },

    #[error("Read of {object_key} failed: {source}")]
    BackendReadFailed {
        object_key: String,
        source: StorageError,
    },

    #[error("Delete of {object_key} failed: {source}")]
    BackendDeleteFailed {
        object_key: String,
        source: StorageError,
    },

    #[error("Backend unavailable during {operation}: {reason}")]
    BackendUnavailable { operation: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Listed object {object_key} is outside database prefix {expected_prefix}")]
    CorruptObjectKey {
        object_key: String,
        expected_prefix: String,
    },

    /// The local async runtime could not be started; no backend was contacted.
    #[error("Local async runtime unavailable: {reason}")]
    RuntimeUnavailable { reason: String },

    #[error("{operation} failed for {} of {total} keys", .failures.len())]
    BatchFailed {
        operation: String,
        total: usize,
        failures: Vec<(usize, Redis3Error)>,
    },
}

impl Redis3Error {
    /// Classify a backend failure for `operation`.
    ///
    /// Connectivity problems become [`Redis3Error::BackendUnavailable`] whatever
    /// the operation; anything else goes through `specific`.
    pub fn from_storage(
        operation: &str,
        error: StorageError,
        specific: impl FnOnce(StorageError) -> Redis3Error,
    ) -> Self {
        match error {
            StorageError::Unavailable { reason } => Redis3Error::BackendUnavailable {
                operation: operation.to_string(),
                reason,
            },
            other => specific(other),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Redis3Error::ProvisioningFailed { .. } => ErrorKind::ProvisioningFailed,
            Redis3Error::BackendWriteFailed { .. } => ErrorKind::BackendWriteFailed,
            Redis3Error::BackendReadFailed { .. } => ErrorKind::BackendReadFailed,
            Redis3Error::BackendDeleteFailed { .. } => ErrorKind::BackendDeleteFailed,
            Redis3Error::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Redis3Error::Validation(ValidationError::InvalidValueType { .. }) => {
                ErrorKind::InvalidValueType
            }
            Redis3Error::Validation(ValidationError::LengthMismatch { .. }) => {
                ErrorKind::LengthMismatch
            }
            Redis3Error::Validation(ValidationError::InvalidDatabaseNumber { .. }) => {
                ErrorKind::InvalidDatabaseNumber
            }
            Redis3Error::CorruptObjectKey { .. } => ErrorKind::CorruptObjectKey,
            Redis3Error::BatchFailed { .. } => ErrorKind::BatchFailed,
            Redis3Error::RuntimeUnavailable { .. } => ErrorKind::RuntimeUnavailable,
        }
    }
}

/// Result type alias for redis3 operations.
pub type Redis3Result<T> = Result<T, Redis3Error>;

// =============================================================================
// TESTS
// =============================================================================
