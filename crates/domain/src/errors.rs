//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::telemetry::{Category, ErrorReport};

/// Main error type for PolicyQA
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum PolicyQaError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Processing of personal data was refused because consent is missing,
    /// withdrawn or expired.
    #[error("Consent required: {0}")]
    ConsentRequired(String),

    /// An answer/classifier collaborator failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PolicyQaError {
    /// Taxonomy bucket used when the error is funnelled into the error ledger.
    pub fn category(&self) -> Category {
        match self {
            Self::Database(_) => Category::Data,
            Self::Config(_) | Self::Internal(_) => Category::System,
            Self::Security(_) | Self::ConsentRequired(_) => Category::Security,
            Self::NotFound(_) => Category::Unknown,
            Self::InvalidInput(_) => Category::UserInput,
            Self::Collaborator(_) => Category::BusinessLogic,
        }
    }

    /// Short machine-readable class name, safe to show to end users.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) => "database_error",
            Self::Config(_) => "config_error",
            Self::Security(_) => "security_error",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::ConsentRequired(_) => "consent_required",
            Self::Collaborator(_) => "collaborator_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message that can be returned to a caller without leaking internals.
    ///
    /// Validation and consent messages are user-facing by construction; every
    /// other class collapses to a generic message.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(message) | Self::ConsentRequired(message) => message.clone(),
            Self::NotFound(_) => "The requested resource was not found".to_string(),
            Self::Database(_)
            | Self::Config(_)
            | Self::Security(_)
            | Self::Collaborator(_)
            | Self::Internal(_) => "The request could not be processed".to_string(),
        }
    }
}

impl From<&PolicyQaError> for ErrorReport {
    fn from(err: &PolicyQaError) -> Self {
        Self::new(format!("PolicyQaError::{}", err.kind()), err.to_string())
    }
}

/// Result type alias for PolicyQA operations
pub type Result<T> = std::result::Result<T, PolicyQaError>;
