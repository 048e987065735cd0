//! Integration tests for the error analysis ledger

mod support;

use std::sync::atomic::Ordering;

use policyqa_core::pattern_fingerprint;
use policyqa_domain::{Category, ErrorContext, ErrorReport, Severity};
use support::fixture::Fixture;

async fn log_high(fixture: &Fixture, n: usize) {
    for i in 0..n {
        let report = ErrorReport::new("TimeoutError", format!("qa model timed out (attempt {i})"));
        fixture
            .errors
            .log_error(&report, "qa_engine", Severity::High, Category::Performance, ErrorContext::default())
            .await;
    }
}

/// Scenario: five high errors raise one alert, the sixth does not, and the
/// tenth crosses the next tier.
#[tokio::test]
async fn test_high_error_alert_once_per_threshold_tier() {
    let fixture = Fixture::new();

    log_high(&fixture, 4).await;
    assert!(fixture.errors.active_alerts().await.unwrap().is_empty());

    log_high(&fixture, 1).await;
    let alerts = fixture.errors.active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, "high_error_rate");
    assert_eq!(alerts[0].error_count, 5);
    assert_eq!(alerts[0].message, "High error rate detected: 5 high errors in the last hour");

    log_high(&fixture, 1).await;
    assert_eq!(fixture.errors.active_alerts().await.unwrap().len(), 1);

    log_high(&fixture, 4).await;
    let alerts = fixture.errors.active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].error_count, 10);
}

#[tokio::test]
async fn test_critical_errors_alert_immediately() {
    let fixture = Fixture::new();
    let report = ErrorReport::new("KeyError", "active key missing");

    fixture
        .errors
        .log_error(&report, "cipher", Severity::Critical, Category::Security, ErrorContext::default())
        .await;

    let alerts = fixture.errors.active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].component.as_deref(), Some("cipher"));
}

/// Scenario: repeated errors sharing a fingerprint fold into one pattern.
#[tokio::test]
async fn test_patterns_fold_by_fingerprint_and_summary_breakdowns() {
    let fixture = Fixture::new();
    let repeated = ErrorReport::new("ValueError", "bad policy number").with_trace("x".repeat(2000));
    for _ in 0..3 {
        fixture
            .errors
            .log_error(&repeated, "lookup", Severity::Low, Category::UserInput, ErrorContext::default())
            .await;
    }
    fixture
        .errors
        .log_error(
            &ErrorReport::new("IOError", "disk full"),
            "storage",
            Severity::Medium,
            Category::Data,
            ErrorContext::default(),
        )
        .await;

    let summary = fixture.errors.summary(24).await.unwrap();

    assert_eq!(summary.total_errors, 4);
    assert_eq!(summary.severity_breakdown[&Severity::Low], 3);
    assert_eq!(summary.category_breakdown[&Category::Data], 1);
    assert_eq!(summary.component_breakdown["lookup"], 3);
    assert_eq!(summary.recent_errors.len(), 4);
    assert_eq!(summary.time_range.hours, 24);

    let top = &summary.top_patterns[0];
    assert_eq!(top.pattern_hash, pattern_fingerprint("ValueError", "lookup", "bad policy number"));
    assert_eq!(top.occurrence_count, 3);
    assert_eq!(top.sample_trace.as_ref().map(|t| t.chars().count()), Some(1000));
}

#[tokio::test]
async fn test_context_defaults_and_resolution_is_one_way() {
    let fixture = Fixture::new();
    let id = fixture
        .errors
        .log_error(
            &ErrorReport::new("ValueError", "oops"),
            "web",
            Severity::Low,
            Category::Unknown,
            ErrorContext { user_id: Some("u1".into()), ..ErrorContext::default() },
        )
        .await;

    let stored = fixture.error_repo.errors.lock()[0].clone();
    assert_eq!(stored.error_id, id);
    assert_eq!(stored.ip_address, "unknown");
    assert_eq!(stored.user_agent, "unknown");
    assert_eq!(stored.user_id.as_deref(), Some("u1"));

    assert!(fixture.errors.resolve_error(&id, "fixed", "ops").await.unwrap());
    assert!(!fixture.errors.resolve_error(&id, "again", "ops").await.unwrap());
    assert_eq!(fixture.error_repo.errors.lock()[0].resolution_notes.as_deref(), Some("fixed"));
}

#[tokio::test]
async fn test_acknowledge_alert_is_one_way() {
    let fixture = Fixture::new();
    fixture
        .errors
        .log_error(&ErrorReport::new("E", "boom"), "x", Severity::Critical, Category::System, ErrorContext::default())
        .await;
    let alert_id = fixture.errors.active_alerts().await.unwrap()[0].id;

    assert!(fixture.errors.acknowledge_alert(alert_id, "ops").await.unwrap());
    assert!(!fixture.errors.acknowledge_alert(alert_id, "ops").await.unwrap());
    assert!(fixture.errors.active_alerts().await.unwrap().is_empty());
}

/// Scenario: the ledger store is down. Logging still returns an id.
#[tokio::test]
async fn test_log_error_never_fails_when_store_is_down() {
    let fixture = Fixture::new();
    fixture.error_repo.fail.store(true, Ordering::SeqCst);

    let id = fixture
        .errors
        .log_error(&ErrorReport::new("E", "boom"), "x", Severity::High, Category::System, ErrorContext::default())
        .await;
    fixture.errors.log_performance_metric("x", "latency", 1.0, Some("ms"), None).await;

    assert!(!id.is_empty());
    assert!(fixture.error_repo.errors.lock().is_empty());
}

#[tokio::test]
async fn test_performance_metrics_aggregate_on_read() {
    let fixture = Fixture::new();
    for value in [10.0, 20.0, 30.0] {
        fixture.errors.log_performance_metric("qa_engine", "response_time", value, Some("ms"), None).await;
    }
    fixture.errors.log_performance_metric("classifier", "response_time", 5.0, Some("ms"), None).await;

    let all = fixture.errors.performance_metrics(None, 1).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].component, "classifier");

    let qa = fixture.errors.performance_metrics(Some("qa_engine"), 1).await.unwrap();
    assert_eq!(qa.len(), 1);
    assert_eq!(qa[0].count, 3);
    assert!((qa[0].avg - 20.0).abs() < f64::EPSILON);
    assert!((qa[0].min - 10.0).abs() < f64::EPSILON);
    assert!((qa[0].max - 30.0).abs() < f64::EPSILON);
}
