//! SQLCipher-backed error ledger: events, patterns, alerts and samples

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use policyqa_common::storage::{SqlCipherConnection, StorageResult};
use policyqa_core::ErrorLedgerRepository;
use policyqa_domain::{
    Alert, ErrorEvent, ErrorPattern, MetricAggregate, NewAlert, PerformanceSample,
    Result as DomainResult, Severity,
};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;

use super::codec::{
    bool_to_int, count_to_u64, from_millis, opt_from_millis, parse_json, parse_text, to_millis,
    usize_to_i64,
};
use super::manager::DbManager;
use crate::errors::{map_join_error, map_storage_error};

/// SqlCipher-based error ledger repository
pub struct SqlCipherErrorLedgerRepository {
    db: Arc<DbManager>,
}

impl SqlCipherErrorLedgerRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Run `f` against a pooled connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqlCipherConnection) -> StorageResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<T> {
            let conn = db.get_connection()?;
            f(&conn).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl ErrorLedgerRepository for SqlCipherErrorLedgerRepository {
    async fn insert_error(&self, event: &ErrorEvent) -> DomainResult<()> {
        let event = event.clone();
        self.with_conn(move |conn| insert_error(conn, &event)).await
    }

    async fn record_pattern_occurrence(&self, pattern: &ErrorPattern) -> DomainResult<()> {
        let pattern = pattern.clone();
        self.with_conn(move |conn| upsert_pattern(conn, &pattern)).await
    }

    async fn count_errors_since(
        &self,
        severity: Severity,
        since: DateTime<Utc>,
    ) -> DomainResult<u64> {
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM errors WHERE severity = ?1 AND timestamp >= ?2",
                params![severity.to_string(), to_millis(since)],
                |row| row.get(0),
            )?;
            Ok(count_to_u64(count))
        })
        .await
    }

    async fn errors_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<ErrorEvent>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {ERROR_COLUMNS} FROM errors WHERE timestamp >= ?1
                 ORDER BY timestamp DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(params![to_millis(since)], map_error_row)
        })
        .await
    }

    async fn top_patterns(&self, limit: usize) -> DomainResult<Vec<ErrorPattern>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT pattern_hash, error_type, component, first_seen, last_seen,
                        occurrence_count, severity, category, sample_message, sample_trace
                 FROM error_patterns
                 ORDER BY occurrence_count DESC, last_seen DESC
                 LIMIT ?1",
            )?;
            stmt.query_map(params![usize_to_i64(limit)], map_pattern_row)
        })
        .await
    }

    async fn resolve_error(
        &self,
        error_id: &str,
        notes: &str,
        resolved_by: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let (error_id, notes, resolved_by) =
            (error_id.to_string(), notes.to_string(), resolved_by.to_string());

        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE errors SET resolved = 1, resolution_notes = ?1, resolved_by = ?2,
                        resolved_at = ?3
                 WHERE error_id = ?4 AND resolved = 0",
                params![notes, resolved_by, to_millis(at), error_id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn insert_alert(&self, alert: &NewAlert) -> DomainResult<i64> {
        let alert = alert.clone();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO error_alerts
                     (timestamp, alert_type, severity, message, error_count, component)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    to_millis(alert.timestamp),
                    alert.alert_type,
                    alert.severity.to_string(),
                    alert.message,
                    i64::try_from(alert.error_count).unwrap_or(i64::MAX),
                    alert.component,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn latest_alert_since(
        &self,
        severity: Severity,
        since: DateTime<Utc>,
    ) -> DomainResult<Option<Alert>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {ALERT_COLUMNS} FROM error_alerts
                 WHERE severity = ?1 AND timestamp >= ?2
                 ORDER BY timestamp DESC, id DESC LIMIT 1"
            );
            let alert = conn
                .inner()
                .query_row(&sql, params![severity.to_string(), to_millis(since)], map_alert_row)
                .optional()?;
            Ok(alert)
        })
        .await
    }

    async fn active_alerts(&self) -> DomainResult<Vec<Alert>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ALERT_COLUMNS} FROM error_alerts WHERE acknowledged = 0
                 ORDER BY timestamp DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(params![], map_alert_row)
        })
        .await
    }

    async fn acknowledge_alert(&self, id: i64, by: &str, at: DateTime<Utc>) -> DomainResult<bool> {
        let by = by.to_string();

        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE error_alerts SET acknowledged = 1, acknowledged_at = ?1, acknowledged_by = ?2
                 WHERE id = ?3 AND acknowledged = 0",
                params![to_millis(at), by, id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn insert_sample(&self, sample: &PerformanceSample) -> DomainResult<()> {
        let sample = sample.clone();

        self.with_conn(move |conn| {
            let extra = sample.additional_data.as_ref().map(serde_json::to_string).transpose()?;
            conn.execute(
                "INSERT INTO performance_metrics
                     (timestamp, component, metric_name, value, unit, additional_data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    to_millis(sample.timestamp),
                    sample.component,
                    sample.metric_name,
                    sample.value,
                    sample.unit,
                    extra,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn metric_aggregates(
        &self,
        component: Option<&str>,
        since: DateTime<Utc>,
    ) -> DomainResult<Vec<MetricAggregate>> {
        let component = component.map(str::to_string);

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT component, metric_name, AVG(value), MIN(value), MAX(value), COUNT(*)
                 FROM performance_metrics
                 WHERE timestamp >= ?1 AND (?2 IS NULL OR component = ?2)
                 GROUP BY component, metric_name
                 ORDER BY component, metric_name",
            )?;
            stmt.query_map(params![to_millis(since), component], |row| {
                Ok(MetricAggregate {
                    component: row.get(0)?,
                    metric_name: row.get(1)?,
                    avg: row.get(2)?,
                    min: row.get(3)?,
                    max: row.get(4)?,
                    count: count_to_u64(row.get(5)?),
                })
            })
        })
        .await
    }
}

// ============================================================================
// SQL
// ============================================================================

const ERROR_COLUMNS: &str = "error_id, timestamp, severity, category, component, error_type,
    message, trace, user_id, session_id, ip_address, user_agent, request_data, response_data,
    resolved, resolution_notes, resolved_by, resolved_at";

const ALERT_COLUMNS: &str = "id, timestamp, alert_type, severity, message, error_count,
    component, acknowledged, acknowledged_at, acknowledged_by";

fn insert_error(conn: &SqlCipherConnection, event: &ErrorEvent) -> StorageResult<()> {
    let request = event.request_data.as_ref().map(serde_json::to_string).transpose()?;
    let response = event.response_data.as_ref().map(serde_json::to_string).transpose()?;

    conn.execute(
        "INSERT INTO errors
             (error_id, timestamp, severity, category, component, error_type, message, trace,
              user_id, session_id, ip_address, user_agent, request_data, response_data,
              resolved, resolution_notes, resolved_by, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            event.error_id,
            to_millis(event.timestamp),
            event.severity.to_string(),
            event.category.to_string(),
            event.component,
            event.error_type,
            event.message,
            event.trace,
            event.user_id,
            event.session_id,
            event.ip_address,
            event.user_agent,
            request,
            response,
            bool_to_int(event.resolved),
            event.resolution_notes,
            event.resolved_by,
            event.resolved_at.map(to_millis),
        ],
    )?;
    Ok(())
}

/// Insert a new fingerprint or fold one more occurrence into the stored one.
/// `last_seen` never moves backwards.
fn upsert_pattern(conn: &SqlCipherConnection, pattern: &ErrorPattern) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO error_patterns
             (pattern_hash, error_type, component, first_seen, last_seen, occurrence_count,
              severity, category, sample_message, sample_trace)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9)
         ON CONFLICT(pattern_hash) DO UPDATE SET
             occurrence_count = occurrence_count + 1,
             last_seen = MAX(last_seen, excluded.last_seen)",
        params![
            pattern.pattern_hash,
            pattern.error_type,
            pattern.component,
            to_millis(pattern.first_seen),
            to_millis(pattern.last_seen),
            pattern.severity.to_string(),
            pattern.category.to_string(),
            pattern.sample_message,
            pattern.sample_trace,
        ],
    )?;
    Ok(())
}

fn map_error_row(row: &Row<'_>) -> rusqlite::Result<ErrorEvent> {
    let severity: String = row.get(2)?;
    let category: String = row.get(3)?;
    let request: Option<String> = row.get(12)?;
    let response: Option<String> = row.get(13)?;

    Ok(ErrorEvent {
        error_id: row.get(0)?,
        timestamp: from_millis(1, row.get(1)?)?,
        severity: parse_text(2, &severity)?,
        category: parse_text(3, &category)?,
        component: row.get(4)?,
        error_type: row.get(5)?,
        message: row.get(6)?,
        trace: row.get(7)?,
        user_id: row.get(8)?,
        session_id: row.get(9)?,
        ip_address: row.get(10)?,
        user_agent: row.get(11)?,
        request_data: request.as_deref().map(|text| parse_json(12, text)).transpose()?,
        response_data: response.as_deref().map(|text| parse_json(13, text)).transpose()?,
        resolved: row.get::<_, i64>(14)? != 0,
        resolution_notes: row.get(15)?,
        resolved_by: row.get(16)?,
        resolved_at: opt_from_millis(17, row.get(17)?)?,
    })
}

fn map_pattern_row(row: &Row<'_>) -> rusqlite::Result<ErrorPattern> {
    let severity: String = row.get(6)?;
    let category: String = row.get(7)?;

    Ok(ErrorPattern {
        pattern_hash: row.get(0)?,
        error_type: row.get(1)?,
        component: row.get(2)?,
        first_seen: from_millis(3, row.get(3)?)?,
        last_seen: from_millis(4, row.get(4)?)?,
        occurrence_count: count_to_u64(row.get(5)?),
        severity: parse_text(6, &severity)?,
        category: parse_text(7, &category)?,
        sample_message: row.get(8)?,
        sample_trace: row.get(9)?,
    })
}

fn map_alert_row(row: &Row<'_>) -> rusqlite::Result<Alert> {
    let severity: String = row.get(3)?;

    Ok(Alert {
        id: row.get(0)?,
        timestamp: from_millis(1, row.get(1)?)?,
        alert_type: row.get(2)?,
        severity: parse_text(3, &severity)?,
        message: row.get(4)?,
        error_count: count_to_u64(row.get(5)?),
        component: row.get(6)?,
        acknowledged: row.get::<_, i64>(7)? != 0,
        acknowledged_at: opt_from_millis(8, row.get(8)?)?,
        acknowledged_by: row.get(9)?,
    })
}
