//! Key rotation
//!
//! A rotation generates a key, re-encrypts every stored value under it row by
//! row, then promotes it. Runs are serialised by an async mutex; callers
//! sharing one database across processes must also hold the infra rotation
//! lock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use policyqa_domain::constants::SYSTEM_ACTOR;
use policyqa_domain::{impl_domain_status_conversions, KeyRecord, Result};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::cipher::CipherService;
use super::keys::{key_store_unavailable, KeyManager};
use super::ports::{EncryptedRecordStore, EncryptedRow};
use crate::audit::AuditLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPhase {
    Idle,
    Rotating,
}

impl_domain_status_conversions!(RotationPhase {
    Idle => "idle",
    Rotating => "rotating",
});

/// Per-store migration counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreMigration {
    pub migrated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationReport {
    pub new_key_id: String,
    pub previous_key_id: Option<String>,
    pub migrated: usize,
    /// Rows left under their old key (undecryptable or failed to write)
    pub skipped: usize,
    pub per_store: BTreeMap<String, StoreMigration>,
    /// The previous key artifact is kept whenever any row may still need it
    pub previous_key_retained: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// No key has been loaded yet
    NoDeadline,
    NotDue { deadline: DateTime<Utc> },
    Rotated(RotationReport),
}

impl RotationOutcome {
    pub fn rotated(&self) -> bool {
        matches!(self, Self::Rotated(_))
    }
}

pub struct KeyRotationCoordinator {
    keys: Arc<KeyManager>,
    cipher: Arc<CipherService>,
    stores: Vec<Arc<dyn EncryptedRecordStore>>,
    audit: Arc<AuditLog>,
    run_guard: Mutex<()>,
    deadline: RwLock<Option<DateTime<Utc>>>,
    phase: RwLock<RotationPhase>,
}

impl KeyRotationCoordinator {
    pub fn new(
        keys: Arc<KeyManager>,
        cipher: Arc<CipherService>,
        stores: Vec<Arc<dyn EncryptedRecordStore>>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            keys,
            cipher,
            stores,
            audit,
            run_guard: Mutex::new(()),
            deadline: RwLock::new(None),
            phase: RwLock::new(RotationPhase::Idle),
        }
    }

    /// Load every key artifact into the cipher and promote the active key.
    ///
    /// With no artifacts a key is generated and persisted. With only expired
    /// artifacts the newest is promoted and the deadline is set to now, so the
    /// next [`rotate_if_due`](Self::rotate_if_due) migrates the data.
    ///
    /// # Errors
    /// Key store failures are fatal and returned as `Security` errors.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<String> {
        let _guard = self.run_guard.lock().await;
        let now = Utc::now();
        let keys = self.keys.load_all().await.map_err(key_store_unavailable)?;
        for key in &keys {
            self.cipher.register(key)?;
        }

        let (active, deadline) = match KeyRecord::select_active(&keys, now) {
            Some(active) => (active.clone(), active.expires_at),
            None => match keys.iter().max_by_key(|k| k.created_at) {
                Some(newest) => {
                    warn!(key_id = %newest.key_id, "key_store.all_keys_expired");
                    (newest.clone(), now)
                }
                None => {
                    let key = self.keys.ensure_active().await?;
                    self.cipher.register(&key)?;
                    let expires_at = key.expires_at;
                    (key, expires_at)
                }
            },
        };

        self.cipher.promote(&active.key_id)?;
        *self.deadline.write() = Some(deadline);
        info!(key_id = %active.key_id, loaded = keys.len(), deadline = %deadline, "key_store.initialized");
        Ok(active.key_id)
    }

    /// Rotate when the deadline has passed
    pub async fn rotate_if_due(&self) -> Result<RotationOutcome> {
        let _guard = self.run_guard.lock().await;
        let deadline = *self.deadline.read();
        match deadline {
            None => Ok(RotationOutcome::NoDeadline),
            Some(deadline) if Utc::now() < deadline => Ok(RotationOutcome::NotDue { deadline }),
            Some(_) => self.run().await.map(RotationOutcome::Rotated),
        }
    }

    /// Rotate regardless of the deadline
    pub async fn rotate_now(&self) -> Result<RotationReport> {
        let _guard = self.run_guard.lock().await;
        self.run().await
    }

    pub fn rotation_deadline(&self) -> Option<DateTime<Utc>> {
        *self.deadline.read()
    }

    pub fn is_rotation_due(&self) -> bool {
        self.rotation_deadline().is_some_and(|deadline| Utc::now() >= deadline)
    }

    pub fn phase(&self) -> RotationPhase {
        *self.phase.read()
    }

    async fn run(&self) -> Result<RotationReport> {
        *self.phase.write() = RotationPhase::Rotating;
        let result = self.migrate().await;
        *self.phase.write() = RotationPhase::Idle;
        result
    }

    async fn migrate(&self) -> Result<RotationReport> {
        let started = Instant::now();
        let previous = self.cipher.active_key_id();
        let new_key = self.keys.generate();
        self.keys.persist(&new_key).await.map_err(key_store_unavailable)?;
        self.cipher.register(&new_key)?;
        info!(new_key_id = %new_key.key_id, previous_key_id = ?previous, "key_rotation.started");

        let mut passes = BTreeMap::new();
        for store in &self.stores {
            let pass = self.migrate_store(store.as_ref(), &new_key.key_id, None).await?;
            passes.insert(store.name().to_string(), pass);
        }

        self.cipher.promote_when_quiet(&new_key.key_id).await?;
        *self.deadline.write() = Some(new_key.expires_at);

        // Rows written under the previous key while the first pass ran, and
        // rows the first pass could not write
        let mut catch_up_failed = false;
        if let Some(previous) = previous.as_deref() {
            for store in &self.stores {
                let pass: &mut StorePass = passes.entry(store.name().to_string()).or_default();
                let catch_up = CatchUp { previous, retry: &pass.pending };
                let late = self.migrate_store(store.as_ref(), &new_key.key_id, Some(catch_up)).await;
                match late {
                    Ok(late) => {
                        pass.migrated += late.migrated;
                        pass.unreadable.extend(late.unreadable);
                        pass.pending = late.pending;
                    }
                    Err(_) => catch_up_failed = true,
                }
            }
        }

        let per_store: BTreeMap<String, StoreMigration> =
            passes.iter().map(|(name, pass)| (name.clone(), pass.counts())).collect();
        let migrated = per_store.values().map(|s| s.migrated).sum::<usize>();
        let skipped = per_store.values().map(|s| s.skipped).sum::<usize>();
        let previous_key_retained = previous.is_some() && (skipped > 0 || catch_up_failed);

        if let Some(previous) = previous.as_deref() {
            if !previous_key_retained {
                self.keys.discard(previous).await;
            }
        }

        self.audit.record(SYSTEM_ACTOR, "key_rotation", "encryption_keys", true).await;
        info!(
            new_key_id = %new_key.key_id,
            migrated,
            skipped,
            previous_key_retained,
            duration_ms = started.elapsed().as_millis() as u64,
            "key_rotation.completed"
        );

        Ok(RotationReport {
            new_key_id: new_key.key_id,
            previous_key_id: previous,
            migrated,
            skipped,
            per_store,
            previous_key_retained,
        })
    }

    /// Re-encrypt the rows of one store. A catch-up pass only touches rows
    /// with a value under the previous key and rows to retry.
    async fn migrate_store(
        &self,
        store: &dyn EncryptedRecordStore,
        new_key_id: &str,
        catch_up: Option<CatchUp<'_>>,
    ) -> Result<StorePass> {
        let rows = store.encrypted_rows().await.map_err(|err| {
            warn!(store = store.name(), error = %err, "key_rotation.enumeration_failed");
            err
        })?;
        let mut pass = StorePass::default();

        for row in rows {
            if let Some(catch_up) = &catch_up {
                if !catch_up.covers(&row) {
                    continue;
                }
            }

            let Some(rewritten) = self.reencrypt_row(&row, new_key_id) else {
                warn!(store = store.name(), row_id = row.id, "key_rotation.row_skipped");
                pass.unreadable.insert(row.id);
                continue;
            };

            match store.rewrite_row(&row, &rewritten).await {
                Ok(true) => pass.migrated += 1,
                // After promotion a concurrent write can only use the new key
                Ok(false) if catch_up.is_some() => {
                    debug!(store = store.name(), row_id = row.id, "key_rotation.row_superseded");
                }
                Ok(false) => {
                    debug!(store = store.name(), row_id = row.id, "key_rotation.row_changed");
                    pass.pending.insert(row.id);
                }
                Err(err) => {
                    warn!(store = store.name(), row_id = row.id, error = %err, "key_rotation.row_write_failed");
                    pass.pending.insert(row.id);
                }
            }
        }

        Ok(pass)
    }

    fn reencrypt_row(&self, row: &EncryptedRow, key_id: &str) -> Option<EncryptedRow> {
        let mut fields = BTreeMap::new();
        for (column, stored) in &row.fields {
            fields.insert(column.clone(), self.cipher.reseal(stored, key_id)?);
        }
        Some(EncryptedRow { id: row.id, fields })
    }
}

/// Scope of the pass that runs after promotion
struct CatchUp<'a> {
    previous: &'a str,
    retry: &'a BTreeSet<i64>,
}

impl CatchUp<'_> {
    fn covers(&self, row: &EncryptedRow) -> bool {
        self.retry.contains(&row.id)
            || row.fields.values().any(|v| CipherService::key_id_of(v) == Some(self.previous))
    }
}

/// Outcome of one pass over a store
#[derive(Debug, Default)]
struct StorePass {
    migrated: usize,
    /// No readable value, or re-encryption failed
    unreadable: BTreeSet<i64>,
    /// Write failed or the row changed under the pass
    pending: BTreeSet<i64>,
}

impl StorePass {
    fn counts(&self) -> StoreMigration {
        StoreMigration {
            migrated: self.migrated,
            skipped: self.unreadable.union(&self.pending).count(),
        }
    }
}
