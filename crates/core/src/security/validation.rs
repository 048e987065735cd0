//! Input validation and session tokens
//!
//! The blocked-fragment filter is a request-shape rule, not injection
//! protection; every statement in the store is parameterised.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use policyqa_domain::constants::{
    BLOCKED_INPUT_FRAGMENTS, MAX_INPUT_CHARS, SESSION_TOKEN_BYTES, SESSION_TOKEN_LENGTH,
};
use policyqa_domain::PolicyQaError;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputRejection {
    #[error("Input cannot be empty")]
    Empty,
    #[error("Input too long (max 1000 characters)")]
    TooLong,
    #[error("Invalid input detected")]
    BlockedFragment,
}

impl From<InputRejection> for PolicyQaError {
    fn from(rejection: InputRejection) -> Self {
        Self::InvalidInput(rejection.to_string())
    }
}

/// Check a user question and return it trimmed
pub fn validate_input(text: &str) -> Result<String, InputRejection> {
    if text.trim().is_empty() {
        return Err(InputRejection::Empty);
    }
    if text.chars().count() > MAX_INPUT_CHARS {
        return Err(InputRejection::TooLong);
    }

    let lowered = text.to_lowercase();
    if BLOCKED_INPUT_FRAGMENTS.iter().any(|fragment| lowered.contains(fragment)) {
        return Err(InputRejection::BlockedFragment);
    }

    Ok(text.trim().to_string())
}

/// 32 random bytes, URL-safe base64 without padding
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Shape check only; tokens are not tracked server-side
pub fn validate_session_token(token: &str) -> bool {
    token.len() == SESSION_TOKEN_LENGTH
        && token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
