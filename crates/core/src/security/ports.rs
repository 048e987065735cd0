//! Port interfaces for key storage and encrypted record stores

use std::collections::BTreeMap;

use async_trait::async_trait;
use policyqa_domain::{KeyRecord, Result};

/// Durable storage for key artifacts
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Write the artifact for `key`, replacing any artifact with the same id
    async fn persist(&self, key: &KeyRecord) -> Result<()>;

    /// Every readable artifact. Artifacts that cannot be parsed are skipped.
    /// An artifact that parses but cannot be opened, or failure to enumerate
    /// the store, is an error.
    async fn load_all(&self) -> Result<Vec<KeyRecord>>;

    /// Discard a retired artifact. Removing an unknown id is not an error.
    async fn remove(&self, key_id: &str) -> Result<()>;
}

/// One persisted row with its encrypted columns, keyed by column name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRow {
    pub id: i64,
    pub fields: BTreeMap<String, String>,
}

/// A table whose columns hold values produced by
/// [`CipherService`](super::CipherService)
#[async_trait]
pub trait EncryptedRecordStore: Send + Sync {
    fn name(&self) -> &str;

    /// Snapshot of every row's encrypted columns
    async fn encrypted_rows(&self) -> Result<Vec<EncryptedRow>>;

    /// Replace the encrypted columns of one row, but only while they still
    /// hold the values in `current`. Commits on its own.
    ///
    /// Returns `false` when another writer changed or deleted the row since
    /// `current` was read; nothing is written in that case.
    async fn rewrite_row(&self, current: &EncryptedRow, replacement: &EncryptedRow)
        -> Result<bool>;
}
