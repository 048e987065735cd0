//! # PolicyQA Core
//!
//! Security and compliance services - no infrastructure dependencies.
//!
//! This crate contains:
//! - Key lifecycle, field encryption and rotation
//! - Audit trail, consent ledger and data lifecycle operations
//! - Error analysis ledger with pattern aggregation and alerting
//! - The query pipeline that ties them together for each question
//! - Port interfaces (traits) implemented by `policyqa-infra`
//!
//! ## Architecture Principles
//! - Only depends on `policyqa-common` and `policyqa-domain`
//! - No database, filesystem or HTTP code
//! - All storage and collaborators reached through traits
//! - Services are constructed explicitly and shared via `Arc`

pub mod audit;
pub mod compliance;
pub mod error_analysis;
pub mod query;
pub mod security;

pub use audit::{AuditLog, AuditSink};
pub use compliance::{
    ComplianceLogRepository, ConsentLedger, ConsentRepository, DataLifecycleManager,
    InteractionRepository,
};
pub use error_analysis::{pattern_fingerprint, ErrorAnalysisLedger, ErrorLedgerRepository};
pub use query::{AnswerEngine, Classifier, QueryFailure, QueryPipeline};
pub use security::{
    generate_session_token, security_status, validate_input, validate_session_token,
    CipherService, DecryptOutcome, EncryptedRecordStore, EncryptedRow, InputRejection,
    KeyManager, KeyRotationCoordinator, KeyStore, RotationOutcome, RotationPhase, RotationReport,
    SecurityStatus, StoreMigration, WritePermit,
};
