//! Port interfaces for consent, interaction and compliance-log storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use policyqa_domain::{
    ConsentRecord, ConsentStatistics, DeletionLogEntry, InteractionRecord, NewConsent,
    NewInteraction, ProcessingLogEntry, Result,
};

/// Consent history. Records are appended, never rewritten, except for the
/// one-time withdrawal fields.
#[async_trait]
pub trait ConsentRepository: Send + Sync {
    async fn insert_consent(&self, consent: &NewConsent) -> Result<i64>;

    /// Records for one user and consent type, in any order
    async fn consents_for(&self, user_id: &str, consent_type: &str) -> Result<Vec<ConsentRecord>>;

    /// Every record of a user, newest first
    async fn consents_for_user(&self, user_id: &str) -> Result<Vec<ConsentRecord>>;

    /// Set the withdrawal fields if still unset. Returns whether a row changed.
    async fn mark_withdrawn(&self, id: i64, at: DateTime<Utc>, reason: &str) -> Result<bool>;

    async fn consent_statistics(&self) -> Result<ConsentStatistics>;
}

/// Stored question/answer pairs. `query` and `answer` hold cipher output.
#[async_trait]
pub trait InteractionRepository: Send + Sync {
    async fn insert_interaction(&self, interaction: &NewInteraction) -> Result<i64>;

    /// Every interaction of a user, newest first
    async fn interactions_for_user(&self, user_id: &str) -> Result<Vec<InteractionRecord>>;

    async fn delete_for_user(&self, user_id: &str) -> Result<u64>;

    /// Delete interactions with `timestamp < cutoff`
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Replace the content of one interaction and move it to `owner`
    async fn reassign(&self, id: i64, query: &str, answer: &str, owner: &str) -> Result<()>;
}

/// Processing and deletion logs kept for compliance reporting
#[async_trait]
pub trait ComplianceLogRepository: Send + Sync {
    async fn append_processing(&self, entry: &ProcessingLogEntry) -> Result<()>;

    async fn append_deletion(&self, entry: &DeletionLogEntry) -> Result<()>;

    async fn processing_count(&self) -> Result<u64>;

    async fn deletion_count(&self) -> Result<u64>;
}
