//! Privacy helpers
//!
//! Identifier scrubbing used when user records are anonymised.

pub mod scrub;

pub use scrub::scrub_identifiers;
