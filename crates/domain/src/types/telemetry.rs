//! Error events, patterns, alerts and performance samples

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// How bad an error is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl_domain_status_conversions!(Severity {
    Critical => "critical",
    High => "high",
    Medium => "medium",
    Low => "low",
    Info => "info",
});

impl Severity {
    pub const ALL: [Self; 5] = [Self::Critical, Self::High, Self::Medium, Self::Low, Self::Info];

    /// Events at this severity within the trailing hour needed to raise an alert.
    pub const fn alert_threshold(self) -> u64 {
        match self {
            Self::Critical => 1,
            Self::High => 5,
            Self::Medium => 20,
            Self::Low | Self::Info => 100,
        }
    }
}

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Security,
    Performance,
    Data,
    Network,
    UserInput,
    System,
    External,
    BusinessLogic,
    Unknown,
}

impl_domain_status_conversions!(Category {
    Security => "security",
    Performance => "performance",
    Data => "data",
    Network => "network",
    UserInput => "user_input",
    System => "system",
    External => "external",
    BusinessLogic => "business_logic",
    Unknown => "unknown",
});

/// The failure being reported, detached from its concrete error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub error_type: String,
    pub message: String,
    pub trace: Option<String>,
}

impl ErrorReport {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error_type: error_type.into(), message: message.into(), trace: None }
    }

    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Builds a report from any error, recording its source chain as the trace.
    pub fn capture<E: std::error::Error>(error: &E) -> Self {
        let full_name = std::any::type_name::<E>();
        let error_type = full_name.rsplit("::").next().unwrap_or(full_name).to_string();

        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {cause}"));
            source = cause.source();
        }

        Self {
            error_type,
            message: error.to_string(),
            trace: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }
}

/// Request context attached to an error
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorContext {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_data: Option<serde_json::Value>,
    pub response_data: Option<serde_json::Value>,
}

/// A recorded error. Immutable apart from the one-shot resolution fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub error_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub category: Category,
    pub component: String,
    pub error_type: String,
    pub message: String,
    pub trace: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub request_data: Option<serde_json::Value>,
    pub response_data: Option<serde_json::Value>,
    pub resolved: bool,
    pub resolution_notes: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Aggregate of errors sharing a fingerprint.
///
/// `occurrence_count` only grows and `last_seen` only advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub pattern_hash: String,
    pub error_type: String,
    pub component: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: u64,
    pub severity: Severity,
    pub category: Category,
    pub sample_message: String,
    pub sample_trace: Option<String>,
}

/// Threshold alert. `acknowledged` moves from false to true once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub error_count: u64,
    pub component: Option<String>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
}

/// Insert payload for [`Alert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
    pub timestamp: DateTime<Utc>,
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub error_count: u64,
    pub component: Option<String>,
}

/// A raw performance measurement; aggregation happens on read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub metric_name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub additional_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAggregate {
    pub component: String,
    pub metric_name: String,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub hours: u32,
}

/// Error summary over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub time_range: TimeRange,
    pub total_errors: u64,
    pub severity_breakdown: BTreeMap<Severity, u64>,
    pub category_breakdown: BTreeMap<Category, u64>,
    pub component_breakdown: BTreeMap<String, u64>,
    pub recent_errors: Vec<ErrorEvent>,
    pub top_patterns: Vec<ErrorPattern>,
}
