//! Consent records, privacy policy and data-subject request payloads

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::interaction::ExportedInteraction;
use crate::constants::{PRIVACY_POLICY_LAST_UPDATED, PRIVACY_POLICY_VERSION};

// ============================================================================
// Consent records
// ============================================================================

/// A single consent decision.
///
/// Records are append-only; the only mutation is setting `withdrawn_at`
/// (together with `withdrawal_reason`) exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: i64,
    pub user_id: String,
    pub session_id: String,
    pub consent_type: String,
    pub granted: bool,
    pub granted_at: DateTime<Utc>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub withdrawal_reason: Option<String>,
    pub purposes: BTreeSet<String>,
    pub policy_version: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub retention_period_days: u32,
}

impl ConsentRecord {
    pub fn is_withdrawn(&self) -> bool {
        self.withdrawn_at.is_some()
    }

    /// Expiry is derived from `granted_at` and the validity horizon, never stored.
    pub fn is_expired_at(&self, now: DateTime<Utc>, validity_days: u32) -> bool {
        now - self.granted_at > Duration::days(i64::from(validity_days))
    }

    /// True only for a granted, non-withdrawn, unexpired record.
    pub fn is_effective_at(&self, now: DateTime<Utc>, validity_days: u32) -> bool {
        self.granted && !self.is_withdrawn() && !self.is_expired_at(now, validity_days)
    }

    /// Resolves the authoritative record: the most recent `granted_at`.
    pub fn authoritative(records: &[Self]) -> Option<&Self> {
        records.iter().max_by(|a, b| a.granted_at.cmp(&b.granted_at).then(a.id.cmp(&b.id)))
    }
}

/// Insert payload for [`ConsentRecord`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConsent {
    pub user_id: String,
    pub session_id: String,
    pub consent_type: String,
    pub granted: bool,
    pub granted_at: DateTime<Utc>,
    pub purposes: BTreeSet<String>,
    pub policy_version: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub retention_period_days: u32,
}

/// A user's grant or denial, as submitted by the request layer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsentDecision {
    pub user_id: String,
    pub session_id: String,
    pub consent_type: String,
    pub granted: bool,
    /// `None` applies the default purposes
    pub purposes: Option<BTreeSet<String>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// ============================================================================
// Privacy policy and consent offer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCollectionPolicy {
    pub types: Vec<String>,
    pub purposes: Vec<String>,
    pub legal_basis: String,
    pub retention_period: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRightsPolicy {
    pub access: String,
    pub rectification: String,
    pub erasure: String,
    pub portability: String,
    pub objection: String,
    pub restriction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSharingPolicy {
    pub third_parties: String,
    pub international_transfers: String,
    pub law_enforcement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityMeasures {
    pub encryption: String,
    pub access_controls: String,
    pub data_minimization: String,
    pub anonymization: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub dpo_email: String,
    pub response_time: String,
}

/// The published privacy policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyPolicy {
    pub version: String,
    pub last_updated: String,
    pub data_collection: DataCollectionPolicy,
    pub user_rights: UserRightsPolicy,
    pub data_sharing: DataSharingPolicy,
    pub security_measures: SecurityMeasures,
    pub contact_info: ContactInfo,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

impl PrivacyPolicy {
    /// The policy currently in force.
    pub fn current() -> Self {
        Self {
            version: PRIVACY_POLICY_VERSION.to_string(),
            last_updated: PRIVACY_POLICY_LAST_UPDATED.to_string(),
            data_collection: DataCollectionPolicy {
                types: strings(&["chat_queries", "responses", "session_data", "analytics_data"]),
                purposes: strings(&["service_provision", "analytics", "security", "compliance"]),
                legal_basis: "legitimate_interest".to_string(),
                retention_period: "7_years".to_string(),
            },
            user_rights: UserRightsPolicy {
                access: "Request copy of your data".to_string(),
                rectification: "Correct inaccurate data".to_string(),
                erasure: "Request data deletion".to_string(),
                portability: "Export your data".to_string(),
                objection: "Object to data processing".to_string(),
                restriction: "Limit data processing".to_string(),
            },
            data_sharing: DataSharingPolicy {
                third_parties: "None - data stays local".to_string(),
                international_transfers: "None".to_string(),
                law_enforcement: "Only with valid legal process".to_string(),
            },
            security_measures: SecurityMeasures {
                encryption: "AES-256 encryption at rest and in transit".to_string(),
                access_controls: "Role-based access with audit logging".to_string(),
                data_minimization: "Only collect necessary data".to_string(),
                anonymization: "Data anonymized for analytics".to_string(),
            },
            contact_info: ContactInfo {
                dpo_email: "privacy@insurance-chatbot.com".to_string(),
                response_time: "30_days".to_string(),
            },
        }
    }
}

/// Plain-language notice shown alongside the policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCollectionNotice {
    pub what: String,
    pub why: String,
    pub how_long: String,
    pub who: String,
}

impl Default for DataCollectionNotice {
    fn default() -> Self {
        Self {
            what: "Chat queries, responses, and usage analytics".to_string(),
            why: "To provide insurance information and improve service".to_string(),
            how_long: "7 years (HIPAA requirement)".to_string(),
            who: "Only our organization - no third parties".to_string(),
        }
    }
}

/// What a user is asked to agree to. Producing an offer changes no state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentOffer {
    pub consent_id: String,
    pub user_id: String,
    pub session_id: String,
    pub consent_type: String,
    pub privacy_policy: PrivacyPolicy,
    pub data_collection: DataCollectionNotice,
    pub purposes: Vec<String>,
    pub user_rights: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConsentOffer {
    pub fn default_user_rights() -> Vec<String> {
        strings(&[
            "Access your data",
            "Correct errors",
            "Delete your data",
            "Export your data",
            "Withdraw consent anytime",
        ])
    }
}

// ============================================================================
// Data subject requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedCategories {
    pub chat_interactions: Vec<ExportedInteraction>,
    pub consent_records: Vec<ConsentRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRights {
    pub access: String,
    pub rectification: String,
    pub erasure: String,
    pub portability: String,
}

impl Default for DataRights {
    fn default() -> Self {
        Self {
            access: "You can request a copy of this data anytime".to_string(),
            rectification: "You can request corrections to this data".to_string(),
            erasure: "You can request deletion of this data".to_string(),
            portability: "This export provides your data in a portable format".to_string(),
        }
    }
}

/// Portable bundle of everything held about one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDataExport {
    pub user_id: String,
    pub export_timestamp: DateTime<Utc>,
    pub data_categories: ExportedCategories,
    pub privacy_policy: PrivacyPolicy,
    pub data_rights: DataRights,
}

/// Outcome of a right-to-erasure request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    pub user_id: String,
    pub deletion_type: String,
    pub timestamp: DateTime<Utc>,
    /// Hard-deleted categories, e.g. `chat_data: 3 records`
    pub data_categories: Vec<String>,
    /// Categories kept for compliance instead of being deleted
    pub retention_exceptions: Vec<String>,
    pub legal_hold: bool,
    pub success: bool,
    pub message: String,
}

/// Row appended to the processing log whenever personal data is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub user_id: String,
    pub data_type: String,
    pub processing_purpose: String,
    pub legal_basis: String,
    pub timestamp: DateTime<Utc>,
    pub retention_until: DateTime<Utc>,
}

/// Row appended to the deletion log for each erasure request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionLogEntry {
    pub user_id: String,
    pub deletion_type: String,
    pub data_categories: Vec<String>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsentStatistics {
    pub total_consents: u64,
    pub consents_given: u64,
    pub consents_withdrawn: u64,
}

/// Operator-facing compliance snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceStatus {
    pub compliance_status: String,
    pub privacy_policy_version: String,
    pub data_retention_days: u32,
    pub consent_statistics: ConsentStatistics,
    pub data_processing_logs: u64,
    pub data_deletion_logs: u64,
    pub last_updated: DateTime<Utc>,
}
