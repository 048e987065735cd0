//! File-backed key store
//!
//! Each key lives in its own `<key_id>.key` artifact: a JSON document
//! carrying the base64 material (or, with a passphrase configured, the
//! sealed material) plus its lifetime. Artifacts are written owner-only on
//! unix, through a temporary file that is synced and renamed into place.
//!
//! A file that cannot be read or parsed is skipped. An artifact that parses
//! but cannot be opened (sealed with no passphrase configured, wrong
//! passphrase, bad material) fails the whole load: continuing would mint a
//! fresh key and strand every value written under the old one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use policyqa_common::key_storage::{seal_key, unseal_key};
use policyqa_common::SecureString;
use policyqa_core::KeyStore;
use policyqa_domain::{KeyRecord, PolicyQaError, Result};
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{debug, warn};

use crate::errors::map_join_error;

const ARTIFACT_EXTENSION: &str = "key";
const TEMP_EXTENSION: &str = "tmp";

/// On-disk shape of one key artifact
#[derive(Serialize, Deserialize)]
struct KeyArtifact {
    key_id: String,
    /// Base64 material, or a sealed envelope when `wrapped` is set
    key: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    algorithm: String,
    #[serde(default)]
    wrapped: bool,
}

/// Stores key artifacts as files in a single directory
#[derive(Clone)]
pub struct FileKeyStore {
    directory: PathBuf,
    passphrase: Option<SecureString>,
}

impl FileKeyStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into(), passphrase: None }
    }

    /// Seal every artifact written from now on under `passphrase`
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(SecureString::new(passphrase.into()));
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn artifact_path(&self, key_id: &str) -> Result<PathBuf> {
        if key_id.is_empty() || key_id.contains(['/', '\\']) || key_id.starts_with('.') {
            return Err(PolicyQaError::InvalidInput(format!("invalid key id: {key_id:?}")));
        }
        Ok(self.directory.join(format!("{key_id}.{ARTIFACT_EXTENSION}")))
    }

    fn encode(&self, key: &KeyRecord) -> Result<KeyArtifact> {
        let (material, wrapped) = match &self.passphrase {
            Some(passphrase) => {
                let sealed = seal_key(&key.material, passphrase.expose())
                    .map_err(|e| PolicyQaError::Security(format!("failed to seal key: {e}")))?;
                (sealed, true)
            }
            None => (BASE64.encode(&key.material), false),
        };

        Ok(KeyArtifact {
            key_id: key.key_id.clone(),
            key: material,
            created_at: key.created_at,
            expires_at: key.expires_at,
            algorithm: key.algorithm.clone(),
            wrapped,
        })
    }

    fn decode(&self, artifact: KeyArtifact) -> Result<KeyRecord> {
        let unusable = |reason: String| {
            PolicyQaError::Security(format!("key artifact {} is unusable: {reason}", artifact.key_id))
        };
        let material = if artifact.wrapped {
            let passphrase = self.passphrase.as_ref().ok_or_else(|| {
                unusable("it is sealed but no passphrase is configured".to_string())
            })?;
            unseal_key(&artifact.key, passphrase.expose())
                .map_err(|e| unusable(e.to_string()))?
                .to_vec()
        } else {
            BASE64.decode(artifact.key.as_bytes()).map_err(|e| unusable(e.to_string()))?
        };

        Ok(KeyRecord {
            key_id: artifact.key_id,
            material,
            created_at: artifact.created_at,
            expires_at: artifact.expires_at,
            algorithm: artifact.algorithm,
        })
    }

    fn parse_artifact(path: &Path) -> std::result::Result<KeyArtifact, String> {
        let bytes = fs::read(path).map_err(|e| e.to_string())?;
        serde_json::from_slice(&bytes).map_err(|e| e.to_string())
    }

    fn persist_blocking(&self, key: &KeyRecord) -> Result<()> {
        fs::create_dir_all(&self.directory).map_err(|e| io_error("create key directory", &e))?;
        let path = self.artifact_path(&key.key_id)?;
        let json = serde_json::to_vec_pretty(&self.encode(key)?)
            .map_err(|e| PolicyQaError::Internal(format!("failed to encode key artifact: {e}")))?;

        let temp_path = path.with_extension(TEMP_EXTENSION);
        match fs::remove_file(&temp_path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                return Err(io_error("remove stale key artifact", &e));
            }
            _ => {}
        }

        let mut file = owner_only_options()
            .open(&temp_path)
            .map_err(|e| io_error("create key artifact", &e))?;
        file.write_all(&json).map_err(|e| io_error("write key artifact", &e))?;
        file.sync_all().map_err(|e| io_error("sync key artifact", &e))?;
        drop(file);

        fs::rename(&temp_path, &path).map_err(|e| io_error("install key artifact", &e))?;
        debug!(key_id = %key.key_id, path = %path.display(), "key artifact written");
        Ok(())
    }

    fn load_all_blocking(&self) -> Result<Vec<KeyRecord>> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("read key directory", &e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error("read key directory", &e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            match Self::parse_artifact(&path) {
                Ok(artifact) => keys.push(self.decode(artifact)?),
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "skipping unreadable key artifact");
                }
            }
        }
        Ok(keys)
    }

    fn remove_blocking(&self, key_id: &str) -> Result<()> {
        let path = self.artifact_path(key_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove key artifact", &e)),
        }
    }
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn persist(&self, key: &KeyRecord) -> Result<()> {
        let store = self.clone();
        let key = key.clone();
        task::spawn_blocking(move || store.persist_blocking(&key)).await.map_err(map_join_error)?
    }

    async fn load_all(&self) -> Result<Vec<KeyRecord>> {
        let store = self.clone();
        task::spawn_blocking(move || store.load_all_blocking()).await.map_err(map_join_error)?
    }

    async fn remove(&self, key_id: &str) -> Result<()> {
        let store = self.clone();
        let key_id = key_id.to_string();
        task::spawn_blocking(move || store.remove_blocking(&key_id)).await.map_err(map_join_error)?
    }
}

fn io_error(action: &str, err: &io::Error) -> PolicyQaError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => {
            PolicyQaError::Security(format!("failed to {action}: {err}"))
        }
        _ => PolicyQaError::Internal(format!("failed to {action}: {err}")),
    }
}

/// New file, readable and writable by the owner only on unix
fn owner_only_options() -> fs::OpenOptions {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;

    fn key(id: &str) -> KeyRecord {
        let now = Utc::now();
        KeyRecord {
            key_id: id.to_string(),
            material: (0u8..32).collect(),
            created_at: now,
            expires_at: now + Duration::days(90),
            algorithm: "AES-256-GCM".to_string(),
        }
    }

    #[tokio::test]
    async fn persist_then_load_returns_same_material() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path().join("keys"));

        store.persist(&key("k1")).await.unwrap();
        let loaded = store.load_all().await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].key_id, "k1");
        assert_eq!(loaded[0].material, key("k1").material);
    }

    #[tokio::test]
    async fn missing_directory_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path().join("absent"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_artifact_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path());
        store.persist(&key("good")).await.unwrap();
        fs::write(dir.path().join("bad.key"), b"{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].key_id, "good");
    }

    #[tokio::test]
    async fn sealed_artifact_needs_passphrase() {
        let dir = TempDir::new().unwrap();
        let sealed = FileKeyStore::new(dir.path()).with_passphrase("open-sesame");
        sealed.persist(&key("k1")).await.unwrap();

        let raw = fs::read_to_string(dir.path().join("k1.key")).unwrap();
        assert!(raw.contains("\"wrapped\": true"));

        assert_eq!(sealed.load_all().await.unwrap()[0].material, key("k1").material);
    }

    #[tokio::test]
    async fn sealed_artifact_without_passphrase_fails_the_load() {
        let dir = TempDir::new().unwrap();
        FileKeyStore::new(dir.path()).with_passphrase("hunter2").persist(&key("k1")).await.unwrap();

        let err = FileKeyStore::new(dir.path()).load_all().await.unwrap_err();
        assert!(matches!(err, PolicyQaError::Security(_)), "unexpected error: {err:?}");

        let wrong = FileKeyStore::new(dir.path()).with_passphrase("letmein");
        assert!(matches!(wrong.load_all().await, Err(PolicyQaError::Security(_))));
    }

    #[tokio::test]
    async fn persist_leaves_no_temporary_file() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path());
        fs::write(dir.path().join("k1.tmp"), b"left by a crash").unwrap();

        store.persist(&key("k1")).await.unwrap();
        store.persist(&key("k1")).await.unwrap();

        let mut names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["k1.key".to_string()]);
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_ignores_unknown_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path());
        store.persist(&key("k1")).await.unwrap();

        store.remove("k1").await.unwrap();
        store.remove("k1").await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_path_like_key_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path());
        assert!(store.remove("../escape").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn artifacts_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path());
        store.persist(&key("k1")).await.unwrap();

        let mode = fs::metadata(dir.path().join("k1.key")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
