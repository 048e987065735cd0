//! # PolicyQA Domain
//!
//! Business domain types and models for the PolicyQA security and
//! compliance layer.
//!
//! This crate contains:
//! - Key, interaction, consent, audit and error-telemetry records
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants (sentinels, thresholds, defaults)
//!
//! ## Architecture
//! - No dependencies on other PolicyQA crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
