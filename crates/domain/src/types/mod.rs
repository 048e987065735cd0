//! Domain types and models

pub mod audit;
pub mod consent;
pub mod interaction;
pub mod keys;
pub mod telemetry;

pub use audit::AuditEntry;
pub use consent::{
    ComplianceStatus, ConsentDecision, ConsentOffer, ConsentRecord, ConsentStatistics,
    DataCollectionNotice, DataRights, DeletionLogEntry, DeletionReport, ExportedCategories,
    NewConsent, PrivacyPolicy, ProcessingLogEntry, UserDataExport,
};
pub use interaction::{
    ExportedInteraction, InteractionRecord, NewInteraction, QueryRequest, QueryResponse,
};
pub use keys::KeyRecord;
pub use telemetry::{
    Alert, Category, ErrorContext, ErrorEvent, ErrorPattern, ErrorReport, ErrorSummary,
    MetricAggregate, NewAlert, PerformanceSample, Severity, TimeRange,
};
