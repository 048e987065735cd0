//! # PolicyQA API
//!
//! Service layer - application context and the binary entry point.
//!
//! This crate contains:
//! - Application context (dependency injection, no globals)
//! - The built-in knowledge base used as the default answer engine
//! - Tracing initialisation
//!
//! ## Architecture
//! - Depends on `domain`, `core` and `infra`
//! - Wires the ports in `core` to the adapters in `infra`

pub mod context;
pub mod knowledge;
pub mod utils;

pub use context::AppContext;
pub use knowledge::{KeywordClassifier, KnowledgeBase};
