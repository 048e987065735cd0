//! Error types shared by the crypto, privacy and storage modules
//!
//! `CommonError` holds the failure classes that more than one module can
//! produce. Module errors wrap it instead of repeating its variants, and
//! every error in the crate reports retryability and severity through
//! [`ErrorClassification`] so callers can pick a log level without matching
//! on concrete types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type CommonResult<T> = Result<T, CommonError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    /// Malformed JSON or another encoded payload
    #[error("{format} payload could not be decoded: {message}")]
    Serialization { format: String, message: String },

    /// File I/O
    #[error("persistence failure: {message}")]
    Persistence { message: String },

    #[error("'{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// A caller-supplied value was rejected before any work was done
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Bad key length, malformed ciphertext or a failed authentication tag
    #[error("cryptographic failure: {message}")]
    Crypto { message: String },

    #[error("storage failure{}: {message}", during(.operation))]
    Storage { message: String, operation: Option<String> },
}

fn during(operation: &Option<String>) -> String {
    operation.as_ref().map(|op| format!(" during '{op}'")).unwrap_or_default()
}

impl CommonError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto { message: message.into() }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Serialization { .. }
            | Self::Persistence { .. }
            | Self::Validation { .. }
            | Self::Storage { .. } => ErrorSeverity::Error,
            Self::Crypto { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Crypto { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Retryability and severity, implemented by every error in this crate
pub trait ErrorClassification {
    /// Transient failures (timeouts, a busy database) that may succeed later
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// Integrity is at risk; someone should look now
    fn is_critical(&self) -> bool;

    /// Suggested delay before a retry, when the error knows one
    fn retry_after(&self) -> Option<Duration>;
}

/// Log level hint, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { format: "JSON".to_string(), message: err.to_string() }
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_failures_are_critical_and_final() {
        let err = CommonError::crypto("aead::Error");
        assert_eq!(err.to_string(), "cryptographic failure: aead::Error");
        assert!(err.is_critical());
        assert!(!err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn timeouts_are_retryable_warnings() {
        let err = CommonError::timeout("pool.get", Duration::from_secs(5));
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert!(err.to_string().contains("pool.get"));
    }

    #[test]
    fn storage_message_names_the_operation_when_known() {
        let plain = CommonError::Storage { message: "locked".into(), operation: None };
        let named =
            CommonError::Storage { message: "locked".into(), operation: Some("purge".into()) };

        assert_eq!(plain.to_string(), "storage failure: locked");
        assert_eq!(named.to_string(), "storage failure during 'purge': locked");
    }

    #[test]
    fn malformed_json_becomes_a_serialization_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = CommonError::from(parse_err);
        assert!(matches!(err, CommonError::Serialization { ref format, .. } if format == "JSON"));
    }

    #[test]
    fn severity_orders_and_renders() {
        assert!(ErrorSeverity::Critical > ErrorSeverity::Warning);
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }
}
