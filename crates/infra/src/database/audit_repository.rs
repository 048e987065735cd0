//! SQLCipher-backed audit trail

use std::sync::Arc;

use async_trait::async_trait;
use policyqa_core::AuditSink;
use policyqa_domain::{AuditEntry, Result as DomainResult};
use rusqlite::{params, Row};
use tokio::task;

use super::codec::{bool_to_int, from_millis, to_millis, usize_to_i64};
use super::manager::DbManager;
use crate::errors::{map_join_error, map_storage_error};

/// Append-only audit log stored in the `audit_log` table
pub struct SqlCipherAuditRepository {
    db: Arc<DbManager>,
}

impl SqlCipherAuditRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for SqlCipherAuditRepository {
    async fn append(&self, entry: &AuditEntry) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let entry = entry.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO audit_log (timestamp, user_id, action, resource, success)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    to_millis(entry.timestamp),
                    entry.user_id,
                    entry.action,
                    entry.resource,
                    bool_to_int(entry.success),
                ],
            )
            .map_err(map_storage_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn recent(&self, limit: usize) -> DomainResult<Vec<AuditEntry>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<AuditEntry>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT timestamp, user_id, action, resource, success FROM audit_log
                     ORDER BY timestamp DESC, id DESC LIMIT ?1",
                )
                .map_err(map_storage_error)?;
            stmt.query_map(params![usize_to_i64(limit)], map_audit_row).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_audit_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        timestamp: from_millis(0, row.get(0)?)?,
        user_id: row.get(1)?,
        action: row.get(2)?,
        resource: row.get(3)?,
        success: row.get::<_, i64>(4)? != 0,
    })
}
