//! Symmetric key records

use std::fmt;

use chrono::{DateTime, Utc};

/// A symmetric data key.
///
/// Material is raw bytes and never leaves process memory except inside a key
/// artifact. `Debug` output redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub key_id: String,
    pub material: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub algorithm: String,
}

impl KeyRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Picks the active key: newest `created_at` among keys not yet expired.
    pub fn select_active(keys: &[Self], now: DateTime<Utc>) -> Option<&Self> {
        keys.iter().filter(|key| !key.is_expired_at(now)).max_by_key(|key| key.created_at)
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("key_id", &self.key_id)
            .field("material", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
