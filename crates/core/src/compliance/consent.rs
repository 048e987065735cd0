//! Consent ledger
//!
//! A user's consent for a type is decided by the authoritative record: the one
//! with the latest `granted_at`. It is effective when granted, not withdrawn
//! and younger than the validity horizon (`data_retention_days`).

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use policyqa_domain::constants::{DEFAULT_CONSENT_PURPOSES, PRIVACY_POLICY_VERSION};
use policyqa_domain::{
    ComplianceStatus, ConsentDecision, ConsentOffer, ConsentRecord, DataCollectionNotice,
    NewConsent, PolicyQaError, PrivacyPolicy, ProcessingLogEntry, Result,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::ports::{ComplianceLogRepository, ConsentRepository};
use crate::audit::AuditLog;

pub struct ConsentLedger {
    consents: Arc<dyn ConsentRepository>,
    logs: Arc<dyn ComplianceLogRepository>,
    audit: Arc<AuditLog>,
    validity_days: u32,
}

impl ConsentLedger {
    pub fn new(
        consents: Arc<dyn ConsentRepository>,
        logs: Arc<dyn ComplianceLogRepository>,
        audit: Arc<AuditLog>,
        validity_days: u32,
    ) -> Self {
        Self { consents, logs, audit, validity_days }
    }

    /// Build the consent request shown to the user. Nothing is stored.
    pub async fn request_consent(
        &self,
        user_id: &str,
        session_id: &str,
        consent_type: &str,
    ) -> ConsentOffer {
        self.audit.record(user_id, "consent_request", consent_type, true).await;

        ConsentOffer {
            consent_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            consent_type: consent_type.to_string(),
            privacy_policy: PrivacyPolicy::current(),
            data_collection: DataCollectionNotice::default(),
            purposes: DEFAULT_CONSENT_PURPOSES.iter().map(|p| p.to_string()).collect(),
            user_rights: ConsentOffer::default_user_rights(),
            timestamp: Utc::now(),
        }
    }

    /// Append a grant or denial. Prior records are never modified.
    ///
    /// Returns false if the record could not be stored.
    pub async fn record_decision(&self, decision: ConsentDecision) -> bool {
        let purposes = decision.purposes.clone().unwrap_or_else(|| {
            DEFAULT_CONSENT_PURPOSES.iter().map(|p| p.to_string()).collect::<BTreeSet<_>>()
        });
        let consent = NewConsent {
            user_id: decision.user_id.clone(),
            session_id: decision.session_id.clone(),
            consent_type: decision.consent_type.clone(),
            granted: decision.granted,
            granted_at: Utc::now(),
            purposes,
            policy_version: PRIVACY_POLICY_VERSION.to_string(),
            ip_address: decision.ip_address.clone(),
            user_agent: decision.user_agent.clone(),
            retention_period_days: self.validity_days,
        };

        match self.consents.insert_consent(&consent).await {
            Ok(id) => {
                let action = if decision.granted { "consent_granted" } else { "consent_denied" };
                self.audit.record(&decision.user_id, action, &decision.consent_type, true).await;
                info!(consent_id = id, consent_type = %decision.consent_type, granted = decision.granted, "consent.recorded");
                true
            }
            Err(err) => {
                error!(error = %err, "consent.record_failed");
                self.audit.record(&decision.user_id, "consent_error", &decision.consent_type, false).await;
                false
            }
        }
    }

    /// Whether the user currently consents. Store failures deny.
    pub async fn check_consent(&self, user_id: &str, consent_type: &str) -> bool {
        match self.consents.consents_for(user_id, consent_type).await {
            Ok(history) => ConsentRecord::authoritative(&history)
                .is_some_and(|record| record.is_effective_at(Utc::now(), self.validity_days)),
            Err(err) => {
                warn!(error = %err, consent_type, "consent.check_failed");
                false
            }
        }
    }

    /// [`check_consent`](Self::check_consent) as a gate
    ///
    /// # Errors
    /// `ConsentRequired` when the user has not consented.
    pub async fn require_consent(&self, user_id: &str, consent_type: &str) -> Result<()> {
        if self.check_consent(user_id, consent_type).await {
            Ok(())
        } else {
            Err(PolicyQaError::ConsentRequired(format!(
                "Consent for {consent_type} is required before processing personal data"
            )))
        }
    }

    /// Withdraw the authoritative record.
    ///
    /// Returns false when the user has no record. Withdrawing an already
    /// withdrawn record returns true and leaves `withdrawn_at` untouched.
    pub async fn withdraw(&self, user_id: &str, consent_type: &str, reason: &str) -> bool {
        let history = match self.consents.consents_for(user_id, consent_type).await {
            Ok(history) => history,
            Err(err) => {
                warn!(error = %err, consent_type, "consent.withdraw_failed");
                return false;
            }
        };
        let Some(record) = ConsentRecord::authoritative(&history) else {
            return false;
        };
        if record.is_withdrawn() {
            return true;
        }

        match self.consents.mark_withdrawn(record.id, Utc::now(), reason).await {
            Ok(_) => {
                self.audit.record(user_id, "consent_withdrawn", consent_type, true).await;
                true
            }
            Err(err) => {
                warn!(error = %err, consent_type, "consent.withdraw_failed");
                self.audit.record(user_id, "consent_withdrawn", consent_type, false).await;
                false
            }
        }
    }

    /// Withdraw every open record of the user. Returns how many changed; a
    /// record that fails to update is logged and the rest still proceed.
    pub async fn withdraw_all(&self, user_id: &str, reason: &str) -> Result<usize> {
        let now = Utc::now();
        let mut changed = 0;
        for record in self.consents.consents_for_user(user_id).await? {
            if record.is_withdrawn() {
                continue;
            }
            match self.consents.mark_withdrawn(record.id, now, reason).await {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(record_id = record.id, error = %err, "consent.withdraw_failed");
                }
            }
        }
        Ok(changed)
    }

    /// Full consent history, newest first
    pub async fn history(&self, user_id: &str) -> Result<Vec<ConsentRecord>> {
        self.consents.consents_for_user(user_id).await
    }

    /// Note that personal data was processed under this user's consent
    pub async fn record_processing(&self, user_id: &str, data_type: &str, purpose: &str) {
        let now = Utc::now();
        let entry = ProcessingLogEntry {
            user_id: user_id.to_string(),
            data_type: data_type.to_string(),
            processing_purpose: purpose.to_string(),
            legal_basis: "consent".to_string(),
            timestamp: now,
            retention_until: now + Duration::days(i64::from(self.validity_days)),
        };
        if let Err(err) = self.logs.append_processing(&entry).await {
            warn!(error = %err, data_type, "compliance.processing_log_failed");
        }
    }

    pub async fn compliance_status(&self) -> Result<ComplianceStatus> {
        let consent_statistics = self.consents.consent_statistics().await?;
        Ok(ComplianceStatus {
            compliance_status: "ACTIVE".to_string(),
            privacy_policy_version: PRIVACY_POLICY_VERSION.to_string(),
            data_retention_days: self.validity_days,
            consent_statistics,
            data_processing_logs: self.logs.processing_count().await?,
            data_deletion_logs: self.logs.deletion_count().await?,
            last_updated: Utc::now(),
        })
    }

    pub fn validity_days(&self) -> u32 {
        self.validity_days
    }
}
