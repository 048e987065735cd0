//! Key lifecycle: generation, persistence and active-key selection

use std::sync::Arc;

use chrono::{Duration, Utc};
use policyqa_common::EncryptionService;
use policyqa_domain::constants::KEY_ALGORITHM;
use policyqa_domain::{KeyRecord, PolicyQaError, Result};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::ports::KeyStore;

/// Generates keys and selects the active one from a [`KeyStore`]
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    rotation_days: u32,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyStore>, rotation_days: u32) -> Self {
        Self { store, rotation_days }
    }

    pub fn rotation_days(&self) -> u32 {
        self.rotation_days
    }

    /// A fresh key with OS-random material, expiring one rotation period
    /// from now. Nothing is persisted.
    pub fn generate(&self) -> KeyRecord {
        let created_at = Utc::now();
        KeyRecord {
            key_id: Uuid::new_v4().to_string(),
            material: EncryptionService::generate_key().to_vec(),
            created_at,
            expires_at: created_at + Duration::days(i64::from(self.rotation_days)),
            algorithm: KEY_ALGORITHM.to_string(),
        }
    }

    #[instrument(skip(self, key), fields(key_id = %key.key_id))]
    pub async fn persist(&self, key: &KeyRecord) -> Result<()> {
        self.store.persist(key).await
    }

    pub async fn load_all(&self) -> Result<Vec<KeyRecord>> {
        self.store.load_all().await
    }

    /// Newest key that has not expired, if any
    pub async fn load_active(&self) -> Result<Option<KeyRecord>> {
        let keys = self.store.load_all().await?;
        Ok(KeyRecord::select_active(&keys, Utc::now()).cloned())
    }

    /// Load the active key, generating and persisting one when none is valid.
    ///
    /// # Errors
    /// Any store failure is returned as [`PolicyQaError::Security`]; the
    /// caller must not continue without encryption.
    pub async fn ensure_active(&self) -> Result<KeyRecord> {
        let existing = self.load_active().await.map_err(key_store_unavailable)?;
        if let Some(key) = existing {
            return Ok(key);
        }

        let key = self.generate();
        self.persist(&key).await.map_err(key_store_unavailable)?;
        info!(key_id = %key.key_id, expires_at = %key.expires_at, "key_store.generated");
        Ok(key)
    }

    /// Remove a retired artifact. Failures are logged, not returned.
    pub async fn discard(&self, key_id: &str) {
        if let Err(err) = self.store.remove(key_id).await {
            warn!(key_id, error = %err, "key_store.discard_failed");
        }
    }
}

pub(crate) fn key_store_unavailable(err: PolicyQaError) -> PolicyQaError {
    match err {
        PolicyQaError::Security(_) => err,
        other => PolicyQaError::Security(format!("Key store unavailable: {other}")),
    }
}
