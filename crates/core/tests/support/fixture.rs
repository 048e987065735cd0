//! Service wiring over the in-memory repositories

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use policyqa_core::{
    AnswerEngine, AuditLog, CipherService, Classifier, ConsentLedger, DataLifecycleManager,
    EncryptedRecordStore, ErrorAnalysisLedger, KeyManager, KeyRotationCoordinator, QueryPipeline,
};
use policyqa_domain::constants::{DEFAULT_CONSENT_TYPE, PRIVACY_POLICY_VERSION};
use policyqa_domain::{AuditLogLevel, ConsentDecision, NewConsent, SecurityConfig};

use super::collaborators::FixedAnswer;
use super::repositories::{
    MemoryAuditSink, MemoryComplianceLogs, MemoryConsentRepository, MemoryErrorLedger,
    MemoryInteractionStore, MemoryKeyStore,
};

pub struct Fixture {
    pub config: SecurityConfig,
    pub key_store: Arc<MemoryKeyStore>,
    pub audit_sink: Arc<MemoryAuditSink>,
    pub consents: Arc<MemoryConsentRepository>,
    pub interactions: Arc<MemoryInteractionStore>,
    pub logs: Arc<MemoryComplianceLogs>,
    pub error_repo: Arc<MemoryErrorLedger>,
    pub audit: Arc<AuditLog>,
    pub cipher: Arc<CipherService>,
    pub keys: Arc<KeyManager>,
    pub rotation: Arc<KeyRotationCoordinator>,
    pub consent: Arc<ConsentLedger>,
    pub lifecycle: Arc<DataLifecycleManager>,
    pub errors: Arc<ErrorAnalysisLedger>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_key_store(MemoryKeyStore::default())
    }

    pub fn with_key_store(key_store: MemoryKeyStore) -> Self {
        let config = SecurityConfig::default();
        let key_store = Arc::new(key_store);
        let audit_sink = Arc::new(MemoryAuditSink::default());
        let consents = Arc::new(MemoryConsentRepository::default());
        let interactions = Arc::new(MemoryInteractionStore::default());
        let logs = Arc::new(MemoryComplianceLogs::default());
        let error_repo = Arc::new(MemoryErrorLedger::default());

        let audit = Arc::new(AuditLog::new(audit_sink.clone(), AuditLogLevel::Info));
        let cipher = Arc::new(CipherService::new());
        let keys = Arc::new(KeyManager::new(key_store.clone(), config.key_rotation_days));
        let stores: Vec<Arc<dyn EncryptedRecordStore>> = vec![interactions.clone()];
        let rotation = Arc::new(KeyRotationCoordinator::new(
            keys.clone(),
            cipher.clone(),
            stores,
            audit.clone(),
        ));
        let consent = Arc::new(ConsentLedger::new(
            consents.clone(),
            logs.clone(),
            audit.clone(),
            config.data_retention_days,
        ));
        let lifecycle = Arc::new(DataLifecycleManager::new(
            interactions.clone(),
            logs.clone(),
            consent.clone(),
            cipher.clone(),
            audit.clone(),
        ));
        let errors = Arc::new(ErrorAnalysisLedger::new(error_repo.clone()));

        Self {
            config,
            key_store,
            audit_sink,
            consents,
            interactions,
            logs,
            error_repo,
            audit,
            cipher,
            keys,
            rotation,
            consent,
            lifecycle,
            errors,
        }
    }

    /// Fixture with an active key loaded
    pub async fn initialized() -> Self {
        let fixture = Self::new();
        fixture.rotation.initialize().await.unwrap();
        fixture
    }

    pub fn pipeline(&self, answers: Arc<FixedAnswer>, classifier: Option<Arc<dyn Classifier>>) -> QueryPipeline {
        let answers: Arc<dyn AnswerEngine> = answers;
        let pipeline = QueryPipeline::new(
            self.consent.clone(),
            self.cipher.clone(),
            self.interactions.clone(),
            self.audit.clone(),
            self.errors.clone(),
            answers,
        );
        match classifier {
            Some(classifier) => pipeline.with_classifier(classifier),
            None => pipeline,
        }
    }

    pub async fn grant(&self, user_id: &str) {
        let recorded = self
            .consent
            .record_decision(ConsentDecision {
                user_id: user_id.to_string(),
                session_id: "s1".to_string(),
                consent_type: DEFAULT_CONSENT_TYPE.to_string(),
                granted: true,
                purposes: Some(BTreeSet::from(["service_provision".to_string()])),
                ip_address: Some("127.0.0.1".to_string()),
                user_agent: None,
            })
            .await;
        assert!(recorded);
    }

    /// Store a grant dated `granted_at` directly in the repository
    pub fn seed_grant(&self, user_id: &str, granted_at: DateTime<Utc>) -> i64 {
        self.consents.seed(NewConsent {
            user_id: user_id.to_string(),
            session_id: "s1".to_string(),
            consent_type: DEFAULT_CONSENT_TYPE.to_string(),
            granted: true,
            granted_at,
            purposes: BTreeSet::from(["service_provision".to_string()]),
            policy_version: PRIVACY_POLICY_VERSION.to_string(),
            ip_address: None,
            user_agent: None,
            retention_period_days: self.config.data_retention_days,
        })
    }

    /// Store an interaction encrypted under the active key
    pub fn seed_encrypted(&self, user_id: &str, query: &str, answer: &str) -> i64 {
        let query = self.cipher.encrypt(query).unwrap();
        let answer = self.cipher.encrypt(answer).unwrap();
        self.interactions.seed(user_id, &query, &answer, Utc::now())
    }
}
