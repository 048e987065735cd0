//! Consent tracking and data lifecycle

pub mod consent;
pub mod lifecycle;
pub mod ports;

pub use consent::ConsentLedger;
pub use lifecycle::DataLifecycleManager;
pub use ports::{ComplianceLogRepository, ConsentRepository, InteractionRepository};
