//! Port interface for the error ledger store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use policyqa_domain::{
    Alert, ErrorEvent, ErrorPattern, MetricAggregate, NewAlert, PerformanceSample, Result,
    Severity,
};

#[async_trait]
pub trait ErrorLedgerRepository: Send + Sync {
    async fn insert_error(&self, event: &ErrorEvent) -> Result<()>;

    /// Insert `pattern` if its hash is new; otherwise add one to the stored
    /// count and move `last_seen` forward to `pattern.last_seen` if later.
    async fn record_pattern_occurrence(&self, pattern: &ErrorPattern) -> Result<()>;

    async fn count_errors_since(&self, severity: Severity, since: DateTime<Utc>) -> Result<u64>;

    /// Every error at or after `since`, newest first
    async fn errors_since(&self, since: DateTime<Utc>) -> Result<Vec<ErrorEvent>>;

    /// Patterns by descending occurrence count
    async fn top_patterns(&self, limit: usize) -> Result<Vec<ErrorPattern>>;

    /// Set the resolution fields if the error is unresolved. Returns whether
    /// a row changed.
    async fn resolve_error(
        &self,
        error_id: &str,
        notes: &str,
        resolved_by: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn insert_alert(&self, alert: &NewAlert) -> Result<i64>;

    /// Newest alert for `severity` at or after `since`
    async fn latest_alert_since(
        &self,
        severity: Severity,
        since: DateTime<Utc>,
    ) -> Result<Option<Alert>>;

    /// Unacknowledged alerts, newest first
    async fn active_alerts(&self) -> Result<Vec<Alert>>;

    async fn acknowledge_alert(&self, id: i64, by: &str, at: DateTime<Utc>) -> Result<bool>;

    async fn insert_sample(&self, sample: &PerformanceSample) -> Result<()>;

    /// avg/min/max/count per (component, metric_name), ordered by component
    /// then name
    async fn metric_aggregates(
        &self,
        component: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricAggregate>>;
}
