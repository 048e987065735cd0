//! Key rotation against real adapters: file key artifacts, the SQLCipher
//! interaction store and the maintenance routine.

use std::sync::Arc;

use chrono::{Duration, Utc};
use policyqa_core::{
    AuditLog, AuditSink, CipherService, ConsentLedger, DataLifecycleManager, EncryptedRecordStore,
    InteractionRepository, KeyManager, KeyRotationCoordinator, KeyStore,
};
use policyqa_domain::{AuditLogLevel, KeyRecord, NewInteraction};
use policyqa_infra::database::{
    DbManager, SqlCipherAuditRepository, SqlCipherComplianceLogRepository,
    SqlCipherConsentRepository, SqlCipherInteractionRepository,
};
use policyqa_infra::{FileKeyStore, MaintenanceRoutine, RotationLock};
use tempfile::TempDir;

const TEST_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

struct Harness {
    dir: TempDir,
    key_store: Arc<FileKeyStore>,
    interactions: Arc<SqlCipherInteractionRepository>,
    audit_repo: Arc<SqlCipherAuditRepository>,
    cipher: Arc<CipherService>,
    rotation: Arc<KeyRotationCoordinator>,
    lifecycle: Arc<DataLifecycleManager>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().expect("temporary directory should be created");
        let manager = Arc::new(
            DbManager::new(dir.path().join("policyqa.db"), 4, Some(TEST_KEY))
                .expect("database manager should initialise"),
        );
        manager.run_migrations().expect("schema should apply");

        let key_store = Arc::new(FileKeyStore::new(dir.path().join("keys")));
        let interactions = Arc::new(SqlCipherInteractionRepository::new(Arc::clone(&manager)));
        let audit_repo = Arc::new(SqlCipherAuditRepository::new(Arc::clone(&manager)));
        let logs = Arc::new(SqlCipherComplianceLogRepository::new(Arc::clone(&manager)));
        let consents = Arc::new(SqlCipherConsentRepository::new(Arc::clone(&manager)));

        let audit = Arc::new(AuditLog::new(audit_repo.clone(), AuditLogLevel::Info));
        let cipher = Arc::new(CipherService::new());
        let keys = Arc::new(KeyManager::new(key_store.clone(), 90));
        let stores: Vec<Arc<dyn EncryptedRecordStore>> = vec![interactions.clone()];
        let rotation = Arc::new(KeyRotationCoordinator::new(
            keys,
            cipher.clone(),
            stores,
            audit.clone(),
        ));
        let consent = Arc::new(ConsentLedger::new(consents, logs.clone(), audit.clone(), 2555));
        let lifecycle = Arc::new(DataLifecycleManager::new(
            interactions.clone(),
            logs,
            consent,
            cipher.clone(),
            audit,
        ));

        Self { dir, key_store, interactions, audit_repo, cipher, rotation, lifecycle }
    }

    async fn store_encrypted(&self, user: &str, query: &str, days_ago: i64) {
        let interaction = NewInteraction {
            query: self.cipher.encrypt(query).unwrap(),
            answer: self.cipher.encrypt(&format!("answer to {query}")).unwrap(),
            category: None,
            timestamp: Utc::now() - Duration::days(days_ago),
            user_id: user.to_string(),
            session_id: "s1".to_string(),
            ip_address: "127.0.0.1".to_string(),
            user_agent: "test-agent".to_string(),
        };
        self.interactions.insert_interaction(&interaction).await.unwrap();
    }

    fn artifact_exists(&self, key_id: &str) -> bool {
        self.dir.path().join("keys").join(format!("{key_id}.key")).exists()
    }
}

fn expired_key(id: &str) -> KeyRecord {
    let now = Utc::now();
    KeyRecord {
        key_id: id.to_string(),
        material: vec![42; 32],
        created_at: now - Duration::days(100),
        expires_at: now - Duration::days(10),
        algorithm: "AES-256-GCM".to_string(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn first_start_generates_and_persists_a_key() {
    let harness = Harness::new();

    let key_id = harness.rotation.initialize().await.unwrap();

    assert!(harness.artifact_exists(&key_id));
    assert!(!harness.rotation.is_rotation_due());
    assert_eq!(harness.key_store.load_all().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_key_is_rotated_and_rows_migrated() {
    let harness = Harness::new();
    harness.key_store.persist(&expired_key("old-key")).await.unwrap();

    assert_eq!(harness.rotation.initialize().await.unwrap(), "old-key");
    assert!(harness.rotation.is_rotation_due());

    harness.store_encrypted("u1", "Is flood damage covered?", 0).await;
    harness.store_encrypted("u2", "What is my deductible?", 0).await;

    let lock_dir = harness.dir.path().to_path_buf();
    let routine = MaintenanceRoutine::new(
        Arc::clone(&harness.rotation),
        Arc::clone(&harness.lifecycle),
        2555,
        lock_dir.clone(),
    );
    let report = routine.run_once().await.unwrap();
    assert!(report.rotated);
    assert_eq!(report.purged, 0);

    let new_key = harness.cipher.active_key_id().unwrap();
    assert_ne!(new_key, "old-key");
    assert!(harness.artifact_exists(&new_key));
    assert!(!harness.artifact_exists("old-key"));
    assert!(!lock_dir.join("rotation.pid").exists());

    let rows = harness.interactions.interactions_for_user("u1").await.unwrap();
    assert_eq!(CipherService::key_id_of(&rows[0].query), Some(new_key.as_str()));
    assert_eq!(harness.cipher.decrypt_or_sentinel(&rows[0].query), "Is flood damage covered?");

    let audit = harness.audit_repo.recent(10).await.unwrap();
    assert!(audit.iter().any(|e| e.action == "key_rotation" && e.success));
}

#[tokio::test(flavor = "multi_thread")]
async fn maintenance_skips_rotation_while_another_process_holds_the_lock() {
    let harness = Harness::new();
    harness.key_store.persist(&expired_key("old-key")).await.unwrap();
    harness.rotation.initialize().await.unwrap();
    harness.store_encrypted("u1", "stale question", 4000).await;

    let lock_dir = harness.dir.path().to_path_buf();
    let _held = RotationLock::acquire(&lock_dir).unwrap();
    let routine = MaintenanceRoutine::new(
        Arc::clone(&harness.rotation),
        Arc::clone(&harness.lifecycle),
        2555,
        lock_dir,
    );

    assert!(routine.run_once().await.is_err());
    assert!(harness.rotation.is_rotation_due());
    assert!(harness.interactions.interactions_for_user("u1").await.unwrap().is_empty());
}

/// Scenario: the service restarts without the passphrase its keys were
/// sealed under. Startup fails instead of minting a key that strands the
/// existing data.
#[tokio::test(flavor = "multi_thread")]
async fn restart_without_passphrase_refuses_to_start() {
    let dir = TempDir::new().unwrap();
    let key_dir = dir.path().join("keys");
    let sealed = KeyManager::new(Arc::new(FileKeyStore::new(&key_dir).with_passphrase("hunter2")), 90);
    let original = sealed.ensure_active().await.unwrap();

    let unsealed = KeyManager::new(Arc::new(FileKeyStore::new(&key_dir)), 90);
    let err = unsealed.ensure_active().await.unwrap_err();

    assert!(matches!(err, policyqa_domain::PolicyQaError::Security(_)), "unexpected error: {err:?}");
    assert_eq!(std::fs::read_dir(&key_dir).unwrap().count(), 1);
    assert_eq!(sealed.ensure_active().await.unwrap().key_id, original.key_id);
}
