//! Port interface for the persisted audit trail

use async_trait::async_trait;
use policyqa_domain::{AuditEntry, Result};

/// Append-only audit storage
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<()>;

    /// Most recent entries, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>>;
}
