//! Retention purge, export, erasure and anonymisation of user data

use std::sync::Arc;

use chrono::{Duration, Utc};
use policyqa_common::scrub_identifiers;
use policyqa_domain::constants::{ANONYMIZED_OWNER, DEFAULT_CONSENT_TYPE, SYSTEM_ACTOR};
use policyqa_domain::{
    DataRights, DeletionLogEntry, DeletionReport, ExportedCategories, ExportedInteraction,
    PrivacyPolicy, Result, UserDataExport,
};
use tracing::{info, instrument, warn};

use super::consent::ConsentLedger;
use super::ports::{ComplianceLogRepository, InteractionRepository};
use crate::audit::AuditLog;
use crate::security::CipherService;

pub struct DataLifecycleManager {
    interactions: Arc<dyn InteractionRepository>,
    logs: Arc<dyn ComplianceLogRepository>,
    consent: Arc<ConsentLedger>,
    cipher: Arc<CipherService>,
    audit: Arc<AuditLog>,
}

impl DataLifecycleManager {
    pub fn new(
        interactions: Arc<dyn InteractionRepository>,
        logs: Arc<dyn ComplianceLogRepository>,
        consent: Arc<ConsentLedger>,
        cipher: Arc<CipherService>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self { interactions, logs, consent, cipher, audit }
    }

    /// Delete interactions older than `retention_days`. Idempotent.
    #[instrument(skip(self))]
    pub async fn purge_expired(&self, retention_days: u32) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let deleted = self.interactions.delete_older_than(cutoff).await?;
        if deleted > 0 {
            info!(deleted, cutoff = %cutoff, "retention.purged");
            self.audit.record(SYSTEM_ACTOR, "retention_purge", "chat_data", true).await;
        }
        Ok(deleted)
    }

    /// Everything held about a user, decrypted
    ///
    /// # Errors
    /// `ConsentRequired` without current `data_processing` consent.
    #[instrument(skip(self))]
    pub async fn export_user(&self, user_id: &str) -> Result<UserDataExport> {
        self.consent.require_consent(user_id, DEFAULT_CONSENT_TYPE).await?;

        let result = self.collect_export(user_id).await;
        let action = if result.is_ok() { "data_export" } else { "data_export_error" };
        self.audit.record(user_id, action, "privacy", result.is_ok()).await;
        result
    }

    async fn collect_export(&self, user_id: &str) -> Result<UserDataExport> {
        let chat_interactions = self
            .interactions
            .interactions_for_user(user_id)
            .await?
            .into_iter()
            .map(|record| ExportedInteraction {
                query: self.cipher.decrypt_or_sentinel(&record.query),
                answer: self.cipher.decrypt_or_sentinel(&record.answer),
                timestamp: record.timestamp,
                category: record.category,
            })
            .collect();
        let consent_records = self.consent.history(user_id).await?;

        Ok(UserDataExport {
            user_id: user_id.to_string(),
            export_timestamp: Utc::now(),
            data_categories: ExportedCategories { chat_interactions, consent_records },
            privacy_policy: PrivacyPolicy::current(),
            data_rights: DataRights::default(),
        })
    }

    /// Erase a user's interactions. Consent records are withdrawn and kept.
    #[instrument(skip(self))]
    pub async fn delete_user(
        &self,
        user_id: &str,
        deletion_type: &str,
        reason: &str,
    ) -> Result<DeletionReport> {
        let result = self.erase(user_id, deletion_type, reason).await;
        let action = if result.is_ok() { "data_deletion" } else { "data_deletion_error" };
        self.audit.record(user_id, action, "privacy", result.is_ok()).await;
        result
    }

    async fn erase(&self, user_id: &str, deletion_type: &str, reason: &str) -> Result<DeletionReport> {
        let mut data_categories = Vec::new();
        let deleted = self.interactions.delete_for_user(user_id).await?;
        if deleted > 0 {
            data_categories.push(format!("chat_data: {deleted} records"));
        }

        let withdrawn = self.consent.withdraw_all(user_id, &format!("Data deletion: {reason}")).await?;

        let timestamp = Utc::now();
        self.logs
            .append_deletion(&DeletionLogEntry {
                user_id: user_id.to_string(),
                deletion_type: deletion_type.to_string(),
                data_categories: data_categories.clone(),
                reason: reason.to_string(),
                timestamp,
            })
            .await?;
        info!(deleted, consents_withdrawn = withdrawn, deletion_type, "erasure.completed");

        Ok(DeletionReport {
            user_id: user_id.to_string(),
            deletion_type: deletion_type.to_string(),
            timestamp,
            data_categories,
            retention_exceptions: vec!["consent_records: retained for compliance".to_string()],
            legal_hold: false,
            success: true,
            message: "User data deleted successfully (consent records retained for compliance)"
                .to_string(),
        })
    }

    /// Scrub and re-encrypt a user's interactions and move them to the
    /// anonymised owner. Rows that fail are logged and skipped.
    ///
    /// Returns false if no key is active or the rows could not be listed.
    #[instrument(skip(self))]
    pub async fn anonymize(&self, user_id: &str) -> bool {
        if !self.cipher.is_ready() {
            return false;
        }
        let records = match self.interactions.interactions_for_user(user_id).await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "anonymize.list_failed");
                self.audit.record(user_id, "data_anonymization", "privacy", false).await;
                return false;
            }
        };

        let mut anonymized = 0usize;
        for record in records {
            let (Some(query), Some(answer)) = (
                self.cipher.decrypt(&record.query).into_plaintext(),
                self.cipher.decrypt(&record.answer).into_plaintext(),
            ) else {
                warn!(record_id = record.id, "anonymize.record_undecryptable");
                continue;
            };

            let _permit = self.cipher.write_permit().await;
            let sealed = self.cipher.encrypt(&scrub_identifiers(&query)).and_then(|q| {
                self.cipher.encrypt(&scrub_identifiers(&answer)).map(|a| (q, a))
            });
            let outcome = match sealed {
                Ok((query, answer)) => {
                    self.interactions.reassign(record.id, &query, &answer, ANONYMIZED_OWNER).await
                }
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => anonymized += 1,
                Err(err) => warn!(record_id = record.id, error = %err, "anonymize.record_failed"),
            }
        }

        info!(anonymized, "anonymize.completed");
        self.audit.record(user_id, "data_anonymization", "privacy", true).await;
        true
    }
}
