//! Field encryption over a key ring
//!
//! Stored values have the form `pqa$1$<key_id>$<payload>`. The embedded key id
//! selects the key, so values written under a previous key stay readable while
//! that key is still in the ring. Values without the marker predate
//! encryption and are returned unchanged.
//!
//! Writers that encrypt and then store hold a [`WritePermit`] across both
//! steps. Promotion waits for outstanding permits, so once a new key is
//! active no value sealed under the old one is still on its way to storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use policyqa_common::{decode_payload, encode_payload, EncryptionService};
use policyqa_domain::constants::{
    CIPHERTEXT_MARKER, CIPHERTEXT_SEPARATOR, DECRYPTION_ERROR_SENTINEL,
};
use policyqa_domain::{KeyRecord, PolicyQaError, Result};
use tokio::sync::{RwLock as WriteBarrier, RwLockReadGuard};
use tracing::{debug, warn};

/// Held by a writer from encryption until its row is stored
pub type WritePermit<'a> = RwLockReadGuard<'a, ()>;

/// Result of reading a stored value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// Marked value decrypted under a key in the ring
    Decrypted(String),
    /// Unmarked value, returned as stored
    Legacy(String),
    /// Marked value that could not be decrypted
    Corrupted,
}

impl DecryptOutcome {
    /// Readable text, if any
    pub fn into_plaintext(self) -> Option<String> {
        match self {
            Self::Decrypted(text) | Self::Legacy(text) => Some(text),
            Self::Corrupted => None,
        }
    }
}

#[derive(Default)]
struct KeyRing {
    active: Option<String>,
    services: HashMap<String, EncryptionService>,
}

/// Encrypts with the active key and decrypts with any registered key
#[derive(Default)]
pub struct CipherService {
    ring: RwLock<KeyRing>,
    writes: WriteBarrier<()>,
    corruption_reported: AtomicBool,
}

impl std::fmt::Debug for CipherService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.ring.read();
        f.debug_struct("CipherService")
            .field("active", &ring.active)
            .field("registered", &ring.services.len())
            .finish()
    }
}

impl CipherService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key to the ring without making it active
    pub fn register(&self, key: &KeyRecord) -> Result<()> {
        let service = EncryptionService::new(&key.material).map_err(|e| {
            PolicyQaError::Security(format!("Key {} is unusable: {e}", key.key_id))
        })?;
        let fingerprint = service.key_fingerprint();
        self.ring.write().services.insert(key.key_id.clone(), service);
        debug!(key_id = %key.key_id, %fingerprint, "cipher.key_registered");
        Ok(())
    }

    /// Make a registered key the one used for new writes
    pub fn promote(&self, key_id: &str) -> Result<()> {
        let mut ring = self.ring.write();
        if !ring.services.contains_key(key_id) {
            return Err(PolicyQaError::Security(format!("Key {key_id} is not registered")));
        }
        ring.active = Some(key_id.to_string());
        Ok(())
    }

    /// Promote once every outstanding [`WritePermit`] is released. New
    /// permits wait until the swap is done.
    pub async fn promote_when_quiet(&self, key_id: &str) -> Result<()> {
        let _quiet = self.writes.write().await;
        self.promote(key_id)
    }

    /// Permit for an encrypt-then-store sequence
    pub async fn write_permit(&self) -> WritePermit<'_> {
        self.writes.read().await
    }

    /// Drop a non-active key from the ring. Returns false for the active key.
    pub fn retire(&self, key_id: &str) -> bool {
        let mut ring = self.ring.write();
        if ring.active.as_deref() == Some(key_id) {
            return false;
        }
        ring.services.remove(key_id).is_some()
    }

    pub fn active_key_id(&self) -> Option<String> {
        self.ring.read().active.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.ring.read().active.is_some()
    }

    /// Encrypt under the active key
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let ring = self.ring.read();
        let key_id = ring
            .active
            .as_deref()
            .ok_or_else(|| PolicyQaError::Security("No active encryption key".to_string()))?;
        Self::seal(&ring, key_id, plaintext)
    }

    /// Encrypt under a specific registered key
    pub fn encrypt_with(&self, key_id: &str, plaintext: &str) -> Result<String> {
        Self::seal(&self.ring.read(), key_id, plaintext)
    }

    pub fn decrypt(&self, stored: &str) -> DecryptOutcome {
        let Some(body) = stored.strip_prefix(CIPHERTEXT_MARKER) else {
            return DecryptOutcome::Legacy(stored.to_string());
        };

        let plaintext = body.split_once(CIPHERTEXT_SEPARATOR).and_then(|(key_id, payload)| {
            let ring = self.ring.read();
            let service = ring.services.get(key_id)?;
            let bytes = service.decrypt_from_string(payload).ok()?;
            String::from_utf8(bytes).ok()
        });

        match plaintext {
            Some(text) => DecryptOutcome::Decrypted(text),
            None => {
                self.report_corruption();
                DecryptOutcome::Corrupted
            }
        }
    }

    /// Re-encrypt a stored value under `key_id` without leaving the byte
    /// level. Legacy values are sealed as they are. `None` when the value
    /// cannot be read or the target key is not registered.
    pub fn reseal(&self, stored: &str, key_id: &str) -> Option<String> {
        let Some(body) = stored.strip_prefix(CIPHERTEXT_MARKER) else {
            return self.encrypt_with(key_id, stored).ok();
        };

        let resealed = body.split_once(CIPHERTEXT_SEPARATOR).and_then(|(from, payload)| {
            let ring = self.ring.read();
            let source = ring.services.get(from)?;
            let target = ring.services.get(key_id)?;
            let rotated = source.reencrypt(&decode_payload(payload).ok()?, target).ok()?;
            encode_payload(&rotated).ok()
        });

        match resealed {
            Some(payload) => Some(format!("{CIPHERTEXT_MARKER}{key_id}{CIPHERTEXT_SEPARATOR}{payload}")),
            None => {
                self.report_corruption();
                None
            }
        }
    }

    /// Decrypt, mapping corrupted values to `[DECRYPTION_ERROR]`
    pub fn decrypt_or_sentinel(&self, stored: &str) -> String {
        self.decrypt(stored)
            .into_plaintext()
            .unwrap_or_else(|| DECRYPTION_ERROR_SENTINEL.to_string())
    }

    /// Key id embedded in a marked value
    pub fn key_id_of(stored: &str) -> Option<&str> {
        stored
            .strip_prefix(CIPHERTEXT_MARKER)
            .and_then(|body| body.split_once(CIPHERTEXT_SEPARATOR))
            .map(|(key_id, _)| key_id)
    }

    fn report_corruption(&self) {
        if !self.corruption_reported.swap(true, Ordering::Relaxed) {
            warn!("cipher.decryption_failed: stored values could not be decrypted; further failures are not logged");
        }
    }

    fn seal(ring: &KeyRing, key_id: &str, plaintext: &str) -> Result<String> {
        let service = ring
            .services
            .get(key_id)
            .ok_or_else(|| PolicyQaError::Security(format!("Key {key_id} is not registered")))?;
        let payload = service
            .encrypt_to_string(plaintext.as_bytes())
            .map_err(|e| PolicyQaError::Security(format!("Encryption failed: {e}")))?;
        Ok(format!("{CIPHERTEXT_MARKER}{key_id}{CIPHERTEXT_SEPARATOR}{payload}"))
    }
}
