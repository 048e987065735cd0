//! Database implementations

pub mod audit_repository;
pub(crate) mod codec;
pub mod compliance_log_repository;
pub mod consent_repository;
pub mod error_ledger_repository;
pub mod interaction_repository;
pub mod manager;

pub use audit_repository::*;
pub use compliance_log_repository::*;
pub use consent_repository::*;
pub use error_ledger_repository::*;
pub use interaction_repository::*;
pub use manager::*;
