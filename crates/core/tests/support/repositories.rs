//! Mock repository implementations for testing
//!
//! Provides in-memory mocks for all core repository ports, enabling
//! deterministic tests without database dependencies. Each mock can be told
//! to fail so degradation paths are reachable.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use policyqa_core::{
    AuditSink, ComplianceLogRepository, ConsentRepository, EncryptedRecordStore, EncryptedRow,
    ErrorLedgerRepository, InteractionRepository, KeyStore,
};
use policyqa_domain::{
    Alert, AuditEntry, ConsentRecord, ConsentStatistics, DeletionLogEntry, ErrorEvent,
    ErrorPattern, InteractionRecord, KeyRecord, MetricAggregate, NewAlert, NewConsent,
    NewInteraction, PerformanceSample, PolicyQaError, ProcessingLogEntry, Result as DomainResult,
    Severity,
};

fn unavailable(what: &str) -> PolicyQaError {
    PolicyQaError::Database(format!("{what} unavailable"))
}

// ============================================================================
// Key store
// ============================================================================

#[derive(Default)]
pub struct MemoryKeyStore {
    keys: Mutex<BTreeMap<String, KeyRecord>>,
    pub fail: AtomicBool,
}

impl MemoryKeyStore {
    pub fn with_keys(keys: Vec<KeyRecord>) -> Self {
        let store = Self::default();
        store.keys.lock().extend(keys.into_iter().map(|k| (k.key_id.clone(), k)));
        store
    }

    pub fn key_ids(&self) -> Vec<String> {
        self.keys.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn persist(&self, key: &KeyRecord) -> DomainResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PolicyQaError::Internal("key directory is read-only".into()));
        }
        self.keys.lock().insert(key.key_id.clone(), key.clone());
        Ok(())
    }

    async fn load_all(&self) -> DomainResult<Vec<KeyRecord>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PolicyQaError::Internal("key directory is unreadable".into()));
        }
        Ok(self.keys.lock().values().cloned().collect())
    }

    async fn remove(&self, key_id: &str) -> DomainResult<()> {
        self.keys.lock().remove(key_id);
        Ok(())
    }
}

// ============================================================================
// Audit sink
// ============================================================================

#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    pub fail: AtomicBool,
}

impl MemoryAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.action.clone()).collect()
    }

    pub fn has(&self, action: &str, success: bool) -> bool {
        self.entries.lock().iter().any(|e| e.action == action && e.success == success)
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: &AuditEntry) -> DomainResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("audit_log"));
        }
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> DomainResult<Vec<AuditEntry>> {
        Ok(self.entries.lock().iter().rev().take(limit).cloned().collect())
    }
}

// ============================================================================
// Consent
// ============================================================================

#[derive(Default)]
pub struct MemoryConsentRepository {
    records: Mutex<Vec<ConsentRecord>>,
    next_id: AtomicI64,
    pub fail: AtomicBool,
    /// Number of upcoming withdrawals that fail
    pub failing_withdrawals: AtomicUsize,
}

impl MemoryConsentRepository {
    pub fn records_for(&self, user_id: &str) -> Vec<ConsentRecord> {
        self.records.lock().iter().filter(|r| r.user_id == user_id).cloned().collect()
    }

    /// Insert a record with an explicit `granted_at`, bypassing the ledger
    pub fn seed(&self, consent: NewConsent) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.records.lock().push(ConsentRecord {
            id,
            user_id: consent.user_id,
            session_id: consent.session_id,
            consent_type: consent.consent_type,
            granted: consent.granted,
            granted_at: consent.granted_at,
            withdrawn_at: None,
            withdrawal_reason: None,
            purposes: consent.purposes,
            policy_version: consent.policy_version,
            ip_address: consent.ip_address,
            user_agent: consent.user_agent,
            retention_period_days: consent.retention_period_days,
        });
        id
    }
}

#[async_trait]
impl ConsentRepository for MemoryConsentRepository {
    async fn insert_consent(&self, consent: &NewConsent) -> DomainResult<i64> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("user_consent"));
        }
        Ok(self.seed(consent.clone()))
    }

    async fn consents_for(&self, user_id: &str, consent_type: &str) -> DomainResult<Vec<ConsentRecord>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("user_consent"));
        }
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| r.user_id == user_id && r.consent_type == consent_type)
            .cloned()
            .collect())
    }

    async fn consents_for_user(&self, user_id: &str) -> DomainResult<Vec<ConsentRecord>> {
        let mut records = self.records_for(user_id);
        records.sort_by(|a, b| b.granted_at.cmp(&a.granted_at));
        Ok(records)
    }

    async fn mark_withdrawn(&self, id: i64, at: DateTime<Utc>, reason: &str) -> DomainResult<bool> {
        if self
            .failing_withdrawals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(unavailable("user_consent"));
        }
        let mut records = self.records.lock();
        match records.iter_mut().find(|r| r.id == id && r.withdrawn_at.is_none()) {
            Some(record) => {
                record.withdrawn_at = Some(at);
                record.withdrawal_reason = Some(reason.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn consent_statistics(&self) -> DomainResult<ConsentStatistics> {
        let records = self.records.lock();
        Ok(ConsentStatistics {
            total_consents: records.len() as u64,
            consents_given: records.iter().filter(|r| r.granted).count() as u64,
            consents_withdrawn: records.iter().filter(|r| r.withdrawn_at.is_some()).count() as u64,
        })
    }
}

// ============================================================================
// Interactions (also the encrypted record store for rotation)
// ============================================================================

#[derive(Default)]
pub struct MemoryInteractionStore {
    rows: Mutex<Vec<InteractionRecord>>,
    next_id: AtomicI64,
    pub fail_inserts: AtomicBool,
    pub fail_enumeration: AtomicBool,
    /// Number of upcoming rewrites that fail
    pub failing_rewrites: AtomicUsize,
}

impl MemoryInteractionStore {
    pub fn rows(&self) -> Vec<InteractionRecord> {
        self.rows.lock().clone()
    }

    pub fn count_for(&self, user_id: &str) -> usize {
        self.rows.lock().iter().filter(|r| r.user_id == user_id).count()
    }

    pub fn get(&self, id: i64) -> Option<InteractionRecord> {
        self.rows.lock().iter().find(|r| r.id == id).cloned()
    }

    /// Insert a row with raw stored values
    pub fn seed(&self, user_id: &str, query: &str, answer: &str, timestamp: DateTime<Utc>) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.lock().push(InteractionRecord {
            id,
            query: query.to_string(),
            answer: answer.to_string(),
            category: None,
            timestamp,
            user_id: user_id.to_string(),
            session_id: "s1".to_string(),
            ip_address: "127.0.0.1".to_string(),
            user_agent: "tests".to_string(),
        });
        id
    }
}

#[async_trait]
impl InteractionRepository for MemoryInteractionStore {
    async fn insert_interaction(&self, interaction: &NewInteraction) -> DomainResult<i64> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(unavailable("interactions"));
        }
        let id = self.seed(
            &interaction.user_id,
            &interaction.query,
            &interaction.answer,
            interaction.timestamp,
        );
        if let Some(row) = self.rows.lock().iter_mut().find(|r| r.id == id) {
            row.category = interaction.category.clone();
            row.session_id = interaction.session_id.clone();
            row.ip_address = interaction.ip_address.clone();
            row.user_agent = interaction.user_agent.clone();
        }
        Ok(id)
    }

    async fn interactions_for_user(&self, user_id: &str) -> DomainResult<Vec<InteractionRecord>> {
        let mut rows: Vec<_> =
            self.rows.lock().iter().filter(|r| r.user_id == user_id).cloned().collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(rows)
    }

    async fn delete_for_user(&self, user_id: &str) -> DomainResult<u64> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| r.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| r.timestamp >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    async fn reassign(&self, id: i64, query: &str, answer: &str, owner: &str) -> DomainResult<()> {
        let mut rows = self.rows.lock();
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PolicyQaError::NotFound(format!("interaction {id}")))?;
        row.query = query.to_string();
        row.answer = answer.to_string();
        row.user_id = owner.to_string();
        Ok(())
    }
}

#[async_trait]
impl EncryptedRecordStore for MemoryInteractionStore {
    fn name(&self) -> &str {
        "interactions"
    }

    async fn encrypted_rows(&self) -> DomainResult<Vec<EncryptedRow>> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(unavailable("interactions"));
        }
        Ok(self
            .rows
            .lock()
            .iter()
            .map(|r| EncryptedRow {
                id: r.id,
                fields: BTreeMap::from([
                    ("query".to_string(), r.query.clone()),
                    ("answer".to_string(), r.answer.clone()),
                ]),
            })
            .collect())
    }

    async fn rewrite_row(
        &self,
        current: &EncryptedRow,
        replacement: &EncryptedRow,
    ) -> DomainResult<bool> {
        let failing = self
            .failing_rewrites
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(unavailable("interactions"));
        }

        let mut rows = self.rows.lock();
        let Some(stored) = rows.iter_mut().find(|r| r.id == current.id) else {
            return Ok(false);
        };
        if current.fields.get("query") != Some(&stored.query)
            || current.fields.get("answer") != Some(&stored.answer)
        {
            return Ok(false);
        }
        if let Some(query) = replacement.fields.get("query") {
            stored.query = query.clone();
        }
        if let Some(answer) = replacement.fields.get("answer") {
            stored.answer = answer.clone();
        }
        Ok(true)
    }
}

// ============================================================================
// Compliance logs
// ============================================================================

#[derive(Default)]
pub struct MemoryComplianceLogs {
    pub processing: Mutex<Vec<ProcessingLogEntry>>,
    pub deletions: Mutex<Vec<DeletionLogEntry>>,
}

#[async_trait]
impl ComplianceLogRepository for MemoryComplianceLogs {
    async fn append_processing(&self, entry: &ProcessingLogEntry) -> DomainResult<()> {
        self.processing.lock().push(entry.clone());
        Ok(())
    }

    async fn append_deletion(&self, entry: &DeletionLogEntry) -> DomainResult<()> {
        self.deletions.lock().push(entry.clone());
        Ok(())
    }

    async fn processing_count(&self) -> DomainResult<u64> {
        Ok(self.processing.lock().len() as u64)
    }

    async fn deletion_count(&self) -> DomainResult<u64> {
        Ok(self.deletions.lock().len() as u64)
    }
}

// ============================================================================
// Error ledger
// ============================================================================

#[derive(Default)]
pub struct MemoryErrorLedger {
    pub errors: Mutex<Vec<ErrorEvent>>,
    pub patterns: Mutex<BTreeMap<String, ErrorPattern>>,
    pub alerts: Mutex<Vec<Alert>>,
    pub samples: Mutex<Vec<PerformanceSample>>,
    pub fail: AtomicBool,
}

impl MemoryErrorLedger {
    fn check(&self) -> DomainResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(unavailable("errors"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ErrorLedgerRepository for MemoryErrorLedger {
    async fn insert_error(&self, event: &ErrorEvent) -> DomainResult<()> {
        self.check()?;
        self.errors.lock().push(event.clone());
        Ok(())
    }

    async fn record_pattern_occurrence(&self, pattern: &ErrorPattern) -> DomainResult<()> {
        self.check()?;
        let mut patterns = self.patterns.lock();
        match patterns.get_mut(&pattern.pattern_hash) {
            Some(existing) => {
                existing.occurrence_count += 1;
                existing.last_seen = existing.last_seen.max(pattern.last_seen);
            }
            None => {
                patterns.insert(pattern.pattern_hash.clone(), pattern.clone());
            }
        }
        Ok(())
    }

    async fn count_errors_since(&self, severity: Severity, since: DateTime<Utc>) -> DomainResult<u64> {
        self.check()?;
        Ok(self
            .errors
            .lock()
            .iter()
            .filter(|e| e.severity == severity && e.timestamp >= since)
            .count() as u64)
    }

    async fn errors_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<ErrorEvent>> {
        self.check()?;
        let mut errors: Vec<_> =
            self.errors.lock().iter().filter(|e| e.timestamp >= since).cloned().collect();
        errors.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(errors)
    }

    async fn top_patterns(&self, limit: usize) -> DomainResult<Vec<ErrorPattern>> {
        self.check()?;
        let mut patterns: Vec<_> = self.patterns.lock().values().cloned().collect();
        patterns.sort_by(|a, b| b.occurrence_count.cmp(&a.occurrence_count));
        patterns.truncate(limit);
        Ok(patterns)
    }

    async fn resolve_error(
        &self,
        error_id: &str,
        notes: &str,
        resolved_by: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        self.check()?;
        let mut errors = self.errors.lock();
        match errors.iter_mut().find(|e| e.error_id == error_id && !e.resolved) {
            Some(event) => {
                event.resolved = true;
                event.resolution_notes = Some(notes.to_string());
                event.resolved_by = Some(resolved_by.to_string());
                event.resolved_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_alert(&self, alert: &NewAlert) -> DomainResult<i64> {
        self.check()?;
        let mut alerts = self.alerts.lock();
        let id = alerts.len() as i64 + 1;
        alerts.push(Alert {
            id,
            timestamp: alert.timestamp,
            alert_type: alert.alert_type.clone(),
            severity: alert.severity,
            message: alert.message.clone(),
            error_count: alert.error_count,
            component: alert.component.clone(),
            acknowledged: false,
            acknowledged_at: None,
            acknowledged_by: None,
        });
        Ok(id)
    }

    async fn latest_alert_since(
        &self,
        severity: Severity,
        since: DateTime<Utc>,
    ) -> DomainResult<Option<Alert>> {
        self.check()?;
        Ok(self
            .alerts
            .lock()
            .iter()
            .filter(|a| a.severity == severity && a.timestamp >= since)
            .max_by_key(|a| (a.timestamp, a.id))
            .cloned())
    }

    async fn active_alerts(&self) -> DomainResult<Vec<Alert>> {
        self.check()?;
        let mut alerts: Vec<_> =
            self.alerts.lock().iter().filter(|a| !a.acknowledged).cloned().collect();
        alerts.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        Ok(alerts)
    }

    async fn acknowledge_alert(&self, id: i64, by: &str, at: DateTime<Utc>) -> DomainResult<bool> {
        self.check()?;
        let mut alerts = self.alerts.lock();
        match alerts.iter_mut().find(|a| a.id == id && !a.acknowledged) {
            Some(alert) => {
                alert.acknowledged = true;
                alert.acknowledged_by = Some(by.to_string());
                alert.acknowledged_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_sample(&self, sample: &PerformanceSample) -> DomainResult<()> {
        self.check()?;
        self.samples.lock().push(sample.clone());
        Ok(())
    }

    async fn metric_aggregates(
        &self,
        component: Option<&str>,
        since: DateTime<Utc>,
    ) -> DomainResult<Vec<MetricAggregate>> {
        self.check()?;
        let mut groups: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        for sample in self.samples.lock().iter() {
            if sample.timestamp < since || component.is_some_and(|c| c != sample.component) {
                continue;
            }
            groups
                .entry((sample.component.clone(), sample.metric_name.clone()))
                .or_default()
                .push(sample.value);
        }
        Ok(groups
            .into_iter()
            .map(|((component, metric_name), values)| MetricAggregate {
                component,
                metric_name,
                avg: values.iter().sum::<f64>() / values.len() as f64,
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                count: values.len() as u64,
            })
            .collect())
    }
}
