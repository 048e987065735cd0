//! Secure string type with automatic memory zeroization
//!
//! Holds database keys and key-store passphrases. The underlying memory is
//! zeroed on drop and neither `Debug` nor `Display` reveals the contents.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secure string that zeroes memory on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Create a new secure string
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    /// Expose the inner value
    ///
    /// The exposed value must not be stored or logged.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for security::secure_string.
    use super::*;

    /// Validates `SecureString::new` behavior for the secure string creation
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `s.len()` equals `4`.
    /// - Confirms `s.expose()` equals `"test"`.
    #[test]
    fn test_secure_string_creation() {
        let s = SecureString::new("test".to_string());
        assert_eq!(s.len(), 4);
        assert_eq!(s.expose(), "test");
        assert!(!s.is_empty());
    }

    /// Validates the redacted formatting scenario.
    ///
    /// Assertions:
    /// - Ensures neither `Debug` nor `Display` contains the secret.
    #[test]
    fn test_secure_string_formatting_is_redacted() {
        let s = SecureString::from("db-key-123");
        assert_eq!(format!("{s:?}"), "SecureString(***)");
        assert_eq!(format!("{s}"), "***");
    }
}
