//! Security audit trail

pub mod ports;
pub mod service;

pub use ports::AuditSink;
pub use service::AuditLog;
