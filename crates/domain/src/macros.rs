//! Macro for implementing Display and FromStr for status enums
//!
//! Severity, category and audit-level enums are persisted as lowercase text.
//! This macro eliminates boilerplate for those conversions by providing
//! a single implementation for both Display and FromStr traits. It handles
//! case-insensitive parsing and consistent string representation.
//!
//! # Example
//!
//! ```rust
//! use policyqa_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum RotationPhase {
//!     Idle,
//!     Rotating,
//! }
//!
//! impl_domain_status_conversions!(RotationPhase {
//!     Idle => "idle",
//!     Rotating => "rotating",
//! });
//! ```

/// Implements Display and FromStr traits for status enums
///
/// This macro generates:
/// - Display trait: converts enum variants to lowercase strings
/// - FromStr trait: parses case-insensitive strings to enum variants
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their string
///   representations
///
/// # Features
///
/// - Case-insensitive parsing (e.g., "PENDING", "pending", "Pending" all work)
/// - Consistent lowercase string output
/// - Descriptive error messages with enum name
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum AlertState {
        Open,
        Acknowledged,
        Resolved,
    }

    impl_domain_status_conversions!(AlertState {
        Open => "open",
        Acknowledged => "acknowledged",
        Resolved => "resolved",
    });

    #[test]
    fn test_display_conversion() {
        assert_eq!(AlertState::Open.to_string(), "open");
        assert_eq!(AlertState::Acknowledged.to_string(), "acknowledged");
        assert_eq!(AlertState::Resolved.to_string(), "resolved");
    }

    #[test]
    fn test_fromstr_is_case_insensitive() {
        assert_eq!(AlertState::from_str("open").unwrap(), AlertState::Open);
        assert_eq!(AlertState::from_str("ACKNOWLEDGED").unwrap(), AlertState::Acknowledged);
        assert_eq!(AlertState::from_str("ReSoLvEd").unwrap(), AlertState::Resolved);
    }

    /// Expands beside the crate's one-parameter `Result` alias
    mod beside_result_alias {
        #[allow(unused_imports)]
        use crate::Result;

        #[derive(Debug, PartialEq, Eq)]
        pub(super) enum Phase {
            Idle,
        }

        impl_domain_status_conversions!(Phase { Idle => "idle" });
    }

    #[test]
    fn test_expands_beside_result_alias() {
        assert_eq!(beside_result_alias::Phase::from_str("IDLE"), Ok(beside_result_alias::Phase::Idle));
    }

    #[test]
    fn test_fromstr_invalid() {
        let result = AlertState::from_str("dismissed");
        assert!(result.unwrap_err().contains("Invalid AlertState: dismissed"));
        assert!(AlertState::from_str("").is_err());
    }
}
