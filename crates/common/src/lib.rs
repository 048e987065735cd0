//! Shared building blocks for the PolicyQA crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors and identifier scrubbing
//! - `runtime`: field encryption, key sealing and secret handling
//! - `platform`: the SQLCipher storage pool
//! - `observability`: tracing instrumentation

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod privacy;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod crypto;
#[cfg(feature = "runtime")]
pub mod security;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod storage;

// Re-exports
// ------------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub use crypto::{decode_payload, encode_payload, key_storage, EncryptedData, EncryptionService};
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "foundation")]
pub use privacy::scrub_identifiers;
#[cfg(feature = "runtime")]
pub use security::SecureString;
