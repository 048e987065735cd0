//! Audit log service

use std::sync::Arc;

use policyqa_domain::{AuditEntry, AuditLogLevel, Result};
use tracing::{info, warn};

use super::ports::AuditSink;

/// Records who did what to which resource, and whether it succeeded.
///
/// Every entry is persisted. Entries passing `level` are also emitted on the
/// `policyqa::audit` tracing target, successes at info and failures at warn.
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
    level: AuditLogLevel,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>, level: AuditLogLevel) -> Self {
        Self { sink, level }
    }

    /// Append an entry. Never fails; a write error is logged and dropped.
    pub async fn record(&self, user_id: &str, action: &str, resource: &str, success: bool) {
        let entry = AuditEntry::new(user_id, action, resource, success);

        if self.level.admits(success) {
            if success {
                info!(target: "policyqa::audit", user_id, action, resource, success, "audit");
            } else {
                warn!(target: "policyqa::audit", user_id, action, resource, success, "audit");
            }
        }

        if let Err(err) = self.sink.append(&entry).await {
            warn!(target: "policyqa::audit", action, error = %err, "audit.write_failed");
        }
    }

    /// Most recent entries, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.sink.recent(limit).await
    }

    pub fn level(&self) -> AuditLogLevel {
        self.level
    }
}
