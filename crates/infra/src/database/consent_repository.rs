//! SQLCipher-backed consent history

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use policyqa_common::storage::{SqlCipherConnection, StorageResult};
use policyqa_core::ConsentRepository;
use policyqa_domain::{ConsentRecord, ConsentStatistics, NewConsent, Result as DomainResult};
use rusqlite::{params, Row};
use tokio::task;

use super::codec::{bool_to_int, count_to_u64, from_millis, opt_from_millis, parse_json, to_millis};
use super::manager::DbManager;
use crate::errors::{map_join_error, map_storage_error};

/// SqlCipher-based consent repository
pub struct SqlCipherConsentRepository {
    db: Arc<DbManager>,
}

impl SqlCipherConsentRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConsentRepository for SqlCipherConsentRepository {
    async fn insert_consent(&self, consent: &NewConsent) -> DomainResult<i64> {
        let db = Arc::clone(&self.db);
        let consent = consent.clone();

        task::spawn_blocking(move || -> DomainResult<i64> {
            let conn = db.get_connection()?;
            insert_consent(&conn, &consent).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn consents_for(&self, user_id: &str, consent_type: &str) -> DomainResult<Vec<ConsentRecord>> {
        let db = Arc::clone(&self.db);
        let (user_id, consent_type) = (user_id.to_string(), consent_type.to_string());

        task::spawn_blocking(move || -> DomainResult<Vec<ConsentRecord>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM user_consent WHERE user_id = ?1 AND consent_type = ?2"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_storage_error)?;
            stmt.query_map(params![user_id, consent_type], map_consent_row)
                .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn consents_for_user(&self, user_id: &str) -> DomainResult<Vec<ConsentRecord>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<ConsentRecord>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM user_consent WHERE user_id = ?1
                 ORDER BY granted_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_storage_error)?;
            stmt.query_map(params![user_id], map_consent_row).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_withdrawn(&self, id: i64, at: DateTime<Utc>, reason: &str) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let reason = reason.to_string();
        let at = to_millis(at);

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE user_consent SET withdrawn_at = ?1, withdrawal_reason = ?2
                     WHERE id = ?3 AND withdrawn_at IS NULL",
                    params![at, reason, id],
                )
                .map_err(map_storage_error)?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn consent_statistics(&self) -> DomainResult<ConsentStatistics> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<ConsentStatistics> {
            let conn = db.get_connection()?;
            query_statistics(&conn).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL
// ============================================================================

const SELECT_COLUMNS: &str = "id, user_id, session_id, consent_type, granted, granted_at,
    withdrawn_at, withdrawal_reason, purposes, policy_version, ip_address, user_agent,
    retention_period_days";

fn insert_consent(conn: &SqlCipherConnection, consent: &NewConsent) -> StorageResult<i64> {
    let purposes = serde_json::to_string(&consent.purposes)?;
    conn.execute(
        "INSERT INTO user_consent
             (user_id, session_id, consent_type, granted, granted_at, purposes, policy_version,
              ip_address, user_agent, retention_period_days)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            consent.user_id,
            consent.session_id,
            consent.consent_type,
            bool_to_int(consent.granted),
            to_millis(consent.granted_at),
            purposes,
            consent.policy_version,
            consent.ip_address,
            consent.user_agent,
            consent.retention_period_days,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn query_statistics(conn: &SqlCipherConnection) -> StorageResult<ConsentStatistics> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN granted = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN withdrawn_at IS NOT NULL THEN 1 ELSE 0 END), 0)
         FROM user_consent",
        params![],
        |row| {
            Ok(ConsentStatistics {
                total_consents: count_to_u64(row.get(0)?),
                consents_given: count_to_u64(row.get(1)?),
                consents_withdrawn: count_to_u64(row.get(2)?),
            })
        },
    )
}

fn map_consent_row(row: &Row<'_>) -> rusqlite::Result<ConsentRecord> {
    let purposes: String = row.get(8)?;
    Ok(ConsentRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        consent_type: row.get(3)?,
        granted: row.get::<_, i64>(4)? != 0,
        granted_at: from_millis(5, row.get(5)?)?,
        withdrawn_at: opt_from_millis(6, row.get(6)?)?,
        withdrawal_reason: row.get(7)?,
        purposes: parse_json::<BTreeSet<String>>(8, &purposes)?,
        policy_version: row.get(9)?,
        ip_address: row.get(10)?,
        user_agent: row.get(11)?,
        retention_period_days: row.get(12)?,
    })
}
