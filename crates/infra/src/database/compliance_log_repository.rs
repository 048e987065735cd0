//! SQLCipher-backed processing and deletion logs

use std::sync::Arc;

use async_trait::async_trait;
use policyqa_common::storage::{SqlCipherConnection, StorageResult};
use policyqa_core::ComplianceLogRepository;
use policyqa_domain::{DeletionLogEntry, ProcessingLogEntry, Result as DomainResult};
use rusqlite::params;
use tokio::task;

use super::codec::{count_to_u64, to_millis};
use super::manager::DbManager;
use crate::errors::{map_join_error, map_storage_error};

pub struct SqlCipherComplianceLogRepository {
    db: Arc<DbManager>,
}

impl SqlCipherComplianceLogRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn count(&self, table: &'static str) -> DomainResult<u64> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<u64> {
            let conn = db.get_connection()?;
            count_rows(&conn, table).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl ComplianceLogRepository for SqlCipherComplianceLogRepository {
    async fn append_processing(&self, entry: &ProcessingLogEntry) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let entry = entry.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO data_processing_log
                     (user_id, data_type, processing_purpose, legal_basis, timestamp, retention_until)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.user_id,
                    entry.data_type,
                    entry.processing_purpose,
                    entry.legal_basis,
                    to_millis(entry.timestamp),
                    to_millis(entry.retention_until),
                ],
            )
            .map_err(map_storage_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn append_deletion(&self, entry: &DeletionLogEntry) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let entry = entry.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_deletion(&conn, &entry).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn processing_count(&self) -> DomainResult<u64> {
        self.count("data_processing_log").await
    }

    async fn deletion_count(&self) -> DomainResult<u64> {
        self.count("data_deletion_log").await
    }
}

// ============================================================================
// SQL
// ============================================================================

fn insert_deletion(conn: &SqlCipherConnection, entry: &DeletionLogEntry) -> StorageResult<()> {
    let categories = serde_json::to_string(&entry.data_categories)?;
    conn.execute(
        "INSERT INTO data_deletion_log (user_id, deletion_type, data_categories, reason, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.user_id,
            entry.deletion_type,
            categories,
            entry.reason,
            to_millis(entry.timestamp),
        ],
    )?;
    Ok(())
}

/// `table` is always one of the two log tables named above
fn count_rows(conn: &SqlCipherConnection, table: &str) -> StorageResult<u64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    let count: i64 = conn.query_row(&sql, params![], |row| row.get(0))?;
    Ok(count_to_u64(count))
}
