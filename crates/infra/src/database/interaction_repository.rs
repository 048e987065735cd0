//! SQLCipher-backed interaction store
//!
//! Implements both the interaction port used by the pipeline and lifecycle
//! services, and the encrypted record store walked by key rotation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use policyqa_common::storage::{SqlCipherConnection, StorageResult};
use policyqa_core::{EncryptedRecordStore, EncryptedRow, InteractionRepository};
use policyqa_domain::{InteractionRecord, NewInteraction, PolicyQaError, Result as DomainResult};
use rusqlite::{params, Row};
use tokio::task;

use super::codec::{from_millis, to_millis};
use super::manager::DbManager;
use crate::errors::{map_join_error, map_storage_error};

const QUERY_COLUMN: &str = "query";
const ANSWER_COLUMN: &str = "answer";

/// SqlCipher-based interaction repository
pub struct SqlCipherInteractionRepository {
    db: Arc<DbManager>,
}

impl SqlCipherInteractionRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InteractionRepository for SqlCipherInteractionRepository {
    async fn insert_interaction(&self, interaction: &NewInteraction) -> DomainResult<i64> {
        let db = Arc::clone(&self.db);
        let interaction = interaction.clone();

        task::spawn_blocking(move || -> DomainResult<i64> {
            let conn = db.get_connection()?;
            insert_interaction(&conn, &interaction).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn interactions_for_user(&self, user_id: &str) -> DomainResult<Vec<InteractionRecord>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<InteractionRecord>> {
            let conn = db.get_connection()?;
            query_by_user(&conn, &user_id).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_for_user(&self, user_id: &str) -> DomainResult<u64> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> DomainResult<u64> {
            let conn = db.get_connection()?;
            let deleted = conn
                .execute("DELETE FROM interactions WHERE user_id = ?1", params![user_id])
                .map_err(map_storage_error)?;
            Ok(deleted as u64)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let db = Arc::clone(&self.db);
        let cutoff = to_millis(cutoff);

        task::spawn_blocking(move || -> DomainResult<u64> {
            let conn = db.get_connection()?;
            let deleted = conn
                .execute("DELETE FROM interactions WHERE timestamp < ?1", params![cutoff])
                .map_err(map_storage_error)?;
            Ok(deleted as u64)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn reassign(&self, id: i64, query: &str, answer: &str, owner: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let (query, answer, owner) = (query.to_string(), answer.to_string(), owner.to_string());

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE interactions SET query = ?1, answer = ?2, user_id = ?3 WHERE id = ?4",
                    params![query, answer, owner, id],
                )
                .map_err(map_storage_error)?;
            if changed == 0 {
                return Err(PolicyQaError::NotFound(format!("interaction {id}")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl EncryptedRecordStore for SqlCipherInteractionRepository {
    fn name(&self) -> &str {
        "interactions"
    }

    async fn encrypted_rows(&self) -> DomainResult<Vec<EncryptedRow>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<EncryptedRow>> {
            let conn = db.get_connection()?;
            query_encrypted_rows(&conn).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn rewrite_row(
        &self,
        current: &EncryptedRow,
        replacement: &EncryptedRow,
    ) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let (current, replacement) = (current.clone(), replacement.clone());

        task::spawn_blocking(move || -> DomainResult<bool> {
            let (old_query, old_answer) = columns(&current)?;
            let (query, answer) = columns(&replacement)?;
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE interactions SET query = ?1, answer = ?2
                     WHERE id = ?3 AND query = ?4 AND answer = ?5",
                    params![query, answer, current.id, old_query, old_answer],
                )
                .map_err(map_storage_error)?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn columns(row: &EncryptedRow) -> DomainResult<(&String, &String)> {
    match (row.fields.get(QUERY_COLUMN), row.fields.get(ANSWER_COLUMN)) {
        (Some(query), Some(answer)) => Ok((query, answer)),
        _ => Err(PolicyQaError::Internal(format!(
            "interaction {} rewrite is missing a column",
            row.id
        ))),
    }
}

// ============================================================================
// SQL
// ============================================================================

const SELECT_COLUMNS: &str =
    "id, query, answer, category, timestamp, user_id, session_id, ip_address, user_agent";

fn insert_interaction(conn: &SqlCipherConnection, row: &NewInteraction) -> StorageResult<i64> {
    conn.execute(
        "INSERT INTO interactions
             (query, answer, category, timestamp, user_id, session_id, ip_address, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row.query,
            row.answer,
            row.category,
            to_millis(row.timestamp),
            row.user_id,
            row.session_id,
            row.ip_address,
            row.user_agent,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn query_by_user(conn: &SqlCipherConnection, user_id: &str) -> StorageResult<Vec<InteractionRecord>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM interactions WHERE user_id = ?1 ORDER BY timestamp DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(params![user_id], map_interaction_row)
}

fn query_encrypted_rows(conn: &SqlCipherConnection) -> StorageResult<Vec<EncryptedRow>> {
    let mut stmt = conn.prepare("SELECT id, query, answer FROM interactions ORDER BY id")?;
    stmt.query_map(params![], |row| {
        Ok(EncryptedRow {
            id: row.get(0)?,
            fields: BTreeMap::from([
                (QUERY_COLUMN.to_string(), row.get::<_, String>(1)?),
                (ANSWER_COLUMN.to_string(), row.get::<_, String>(2)?),
            ]),
        })
    })
}

fn map_interaction_row(row: &Row<'_>) -> rusqlite::Result<InteractionRecord> {
    Ok(InteractionRecord {
        id: row.get(0)?,
        query: row.get(1)?,
        answer: row.get(2)?,
        category: row.get(3)?,
        timestamp: from_millis(4, row.get(4)?)?,
        user_id: row.get(5)?,
        session_id: row.get(6)?,
        ip_address: row.get(7)?,
        user_agent: row.get(8)?,
    })
}

