//! Storage error types
//!
//! Errors raised by the encrypted SQLite layer. Every variant converts into
//! [`CommonError`](crate::CommonError) so callers above the storage layer only
//! handle one type.

use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Database encryption error: {0}")]
    Encryption(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Wrong encryption key or database not encrypted")]
    WrongKeyOrNotEncrypted,

    #[error("Connection timeout after {0}s")]
    Timeout(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: i32, found: i32 },

    #[error(transparent)]
    Common(#[from] crate::CommonError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    R2d2(#[from] r2d2::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

impl ErrorClassification for StorageError {
    /// Timeouts, dropped connections and SQLite BUSY/LOCKED are transient.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Rusqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            Self::Common(common_err) => common_err.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Encryption(_)
            | Self::Migration(_)
            | Self::WrongKeyOrNotEncrypted
            | Self::SchemaVersionMismatch { .. } => ErrorSeverity::Critical,
            Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Common(common_err) => common_err.severity(),
            Self::Connection(_)
            | Self::Query(_)
            | Self::InvalidConfig(_)
            | Self::Io(_)
            | Self::Rusqlite(_)
            | Self::R2d2(_)
            | Self::SerdeJson(_) => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Critical)
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::Common(common_err) => common_err.retry_after(),
            _ => None,
        }
    }
}

impl StorageError {
    /// Wrap the error with the name of the operation that produced it
    pub fn with_operation(self, operation: impl Into<String>) -> Self {
        Self::Common(crate::CommonError::Storage {
            message: self.to_string(),
            operation: Some(operation.into()),
        })
    }

    /// Classify a pool/open failure, mapping SQLCipher's "not a database"
    /// family of messages to [`StorageError::WrongKeyOrNotEncrypted`].
    pub(crate) fn from_open_failure(context: &str, err: impl std::fmt::Display) -> Self {
        let text = err.to_string();
        let lowered = text.to_lowercase();
        if lowered.contains("file is not a database")
            || lowered.contains("file is encrypted")
            || lowered.contains("database disk image is malformed")
            || lowered.contains("notadb")
        {
            Self::WrongKeyOrNotEncrypted
        } else {
            Self::Connection(format!("{context}: {text}"))
        }
    }
}

impl From<StorageError> for crate::CommonError {
    fn from(err: StorageError) -> Self {
        if let StorageError::Common(common_err) = err {
            return common_err;
        }

        crate::CommonError::Storage { message: err.to_string(), operation: None }
    }
}
