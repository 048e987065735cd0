//! Error analysis ledger
//!
//! Errors are stored with their context, folded into patterns by fingerprint
//! and counted per severity over the trailing hour to raise alerts. Logging
//! never fails: if the store is unavailable the event goes to tracing instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use policyqa_domain::constants::{
    ALERT_WINDOW_HOURS, HIGH_ERROR_RATE_ALERT, PATTERN_MESSAGE_PREFIX_CHARS,
    PATTERN_SAMPLE_MESSAGE_CHARS, PATTERN_SAMPLE_TRACE_CHARS, SUMMARY_RECENT_ERRORS,
    SUMMARY_TOP_PATTERNS, UNKNOWN_CLIENT,
};
use policyqa_domain::{
    Alert, Category, ErrorContext, ErrorEvent, ErrorPattern, ErrorReport, ErrorSummary,
    MetricAggregate, NewAlert, PerformanceSample, PolicyQaError, Result, Severity, TimeRange,
};
use sha2::{Digest, Sha256};
use tracing::{error, warn};
use uuid::Uuid;

use super::ports::ErrorLedgerRepository;

/// SHA-256 hex of `"{error_type}:{component}:{first 100 chars of message}"`
pub fn pattern_fingerprint(error_type: &str, component: &str, message: &str) -> String {
    let prefix = truncate(message, PATTERN_MESSAGE_PREFIX_CHARS);
    hex::encode(Sha256::digest(format!("{error_type}:{component}:{prefix}")))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub struct ErrorAnalysisLedger {
    repo: Arc<dyn ErrorLedgerRepository>,
}

impl ErrorAnalysisLedger {
    pub fn new(repo: Arc<dyn ErrorLedgerRepository>) -> Self {
        Self { repo }
    }

    /// Record an error and return its id. Never fails.
    pub async fn log_error(
        &self,
        report: &ErrorReport,
        component: &str,
        severity: Severity,
        category: Category,
        context: ErrorContext,
    ) -> String {
        let event = ErrorEvent {
            error_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            severity,
            category,
            component: component.to_string(),
            error_type: report.error_type.clone(),
            message: report.message.clone(),
            trace: report.trace.clone(),
            user_id: context.user_id,
            session_id: context.session_id,
            ip_address: context.ip_address.unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
            user_agent: context.user_agent.unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
            request_data: context.request_data,
            response_data: context.response_data,
            resolved: false,
            resolution_notes: None,
            resolved_by: None,
            resolved_at: None,
        };

        match self.store(&event).await {
            Ok(()) => error!(
                target: "policyqa::errors",
                error_id = %event.error_id,
                error_type = %event.error_type,
                component,
                severity = %severity,
                "{}",
                event.message
            ),
            Err(err) => error!(
                target: "policyqa::errors",
                error_id = %event.error_id,
                error_type = %event.error_type,
                component,
                severity = %severity,
                category = %category,
                message = %event.message,
                trace = ?event.trace,
                store_error = %err,
                "error_ledger.write_failed"
            ),
        }

        event.error_id
    }

    /// [`log_error`](Self::log_error) for a domain error, categorised by its
    /// variant
    pub async fn log_failure(
        &self,
        err: &PolicyQaError,
        component: &str,
        severity: Severity,
        context: ErrorContext,
    ) -> String {
        self.log_error(&ErrorReport::from(err), component, severity, err.category(), context).await
    }

    async fn store(&self, event: &ErrorEvent) -> Result<()> {
        self.repo.insert_error(event).await?;

        let pattern = ErrorPattern {
            pattern_hash: pattern_fingerprint(&event.error_type, &event.component, &event.message),
            error_type: event.error_type.clone(),
            component: event.component.clone(),
            first_seen: event.timestamp,
            last_seen: event.timestamp,
            occurrence_count: 1,
            severity: event.severity,
            category: event.category,
            sample_message: truncate(&event.message, PATTERN_SAMPLE_MESSAGE_CHARS),
            sample_trace: event.trace.as_deref().map(|t| truncate(t, PATTERN_SAMPLE_TRACE_CHARS)),
        };
        if let Err(err) = self.repo.record_pattern_occurrence(&pattern).await {
            warn!(error = %err, "error_ledger.pattern_update_failed");
        }

        if let Err(err) = self.evaluate_alert(event.severity, &event.component, event.timestamp).await
        {
            warn!(error = %err, "error_ledger.alert_check_failed");
        }

        Ok(())
    }

    /// Raise an alert when the trailing-hour count for `severity` reaches a
    /// higher multiple of its threshold than the latest alert in that window.
    async fn evaluate_alert(
        &self,
        severity: Severity,
        component: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let since = now - Duration::hours(ALERT_WINDOW_HOURS);
        let threshold = severity.alert_threshold();
        let count = self.repo.count_errors_since(severity, since).await?;
        let tier = count / threshold;
        if tier == 0 {
            return Ok(None);
        }

        let last_tier = self
            .repo
            .latest_alert_since(severity, since)
            .await?
            .map_or(0, |alert| alert.error_count / threshold);
        if tier <= last_tier {
            return Ok(None);
        }

        let message = format!("High error rate detected: {count} {severity} errors in the last hour");
        let id = self
            .repo
            .insert_alert(&NewAlert {
                timestamp: now,
                alert_type: HIGH_ERROR_RATE_ALERT.to_string(),
                severity,
                message: message.clone(),
                error_count: count,
                component: Some(component.to_string()),
            })
            .await?;
        error!(target: "policyqa::errors", alert_id = id, component, "ALERT: {message}");
        Ok(Some(id))
    }

    /// Append a raw sample. Never fails.
    pub async fn log_performance_metric(
        &self,
        component: &str,
        metric_name: &str,
        value: f64,
        unit: Option<&str>,
        additional_data: Option<serde_json::Value>,
    ) {
        let sample = PerformanceSample {
            timestamp: Utc::now(),
            component: component.to_string(),
            metric_name: metric_name.to_string(),
            value,
            unit: unit.map(str::to_string),
            additional_data,
        };
        if let Err(err) = self.repo.insert_sample(&sample).await {
            warn!(component, metric_name, error = %err, "error_ledger.metric_write_failed");
        }
    }

    pub async fn performance_metrics(
        &self,
        component: Option<&str>,
        hours: u32,
    ) -> Result<Vec<MetricAggregate>> {
        let since = Utc::now() - Duration::hours(i64::from(hours));
        self.repo.metric_aggregates(component, since).await
    }

    pub async fn summary(&self, hours: u32) -> Result<ErrorSummary> {
        let end = Utc::now();
        let start = end - Duration::hours(i64::from(hours));
        let errors = self.repo.errors_since(start).await?;

        let mut severity_breakdown = BTreeMap::new();
        let mut category_breakdown = BTreeMap::new();
        let mut component_breakdown = BTreeMap::new();
        for event in &errors {
            *severity_breakdown.entry(event.severity).or_insert(0) += 1;
            *category_breakdown.entry(event.category).or_insert(0) += 1;
            *component_breakdown.entry(event.component.clone()).or_insert(0) += 1;
        }

        Ok(ErrorSummary {
            time_range: TimeRange { start, end, hours },
            total_errors: errors.len() as u64,
            severity_breakdown,
            category_breakdown,
            component_breakdown,
            recent_errors: errors.into_iter().take(SUMMARY_RECENT_ERRORS).collect(),
            top_patterns: self.repo.top_patterns(SUMMARY_TOP_PATTERNS).await?,
        })
    }

    /// Mark an error resolved. True only on the first resolution.
    pub async fn resolve_error(&self, error_id: &str, notes: &str, resolved_by: &str) -> Result<bool> {
        self.repo.resolve_error(error_id, notes, resolved_by, Utc::now()).await
    }

    /// True only on the first acknowledgement
    pub async fn acknowledge_alert(&self, alert_id: i64, acknowledged_by: &str) -> Result<bool> {
        self.repo.acknowledge_alert(alert_id, acknowledged_by, Utc::now()).await
    }

    pub async fn active_alerts(&self) -> Result<Vec<Alert>> {
        self.repo.active_alerts().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_ignores_message_tail_beyond_prefix() {
        let head = "x".repeat(100);
        let a = pattern_fingerprint("Timeout", "qa_engine", &format!("{head} first"));
        let b = pattern_fingerprint("Timeout", "qa_engine", &format!("{head} second"));
        let c = pattern_fingerprint("Timeout", "classifier", &format!("{head} first"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("ééé", 2), "éé");
        assert_eq!(truncate("ab", 10), "ab");
    }
}
