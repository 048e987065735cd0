//! Application context - dependency injection container
//!
//! Every service is built here from an [`AppConfig`] and shared through
//! `Arc`. Nothing is global, so tests can run several contexts side by side.

use std::path::PathBuf;
use std::sync::Arc;

use policyqa_core::{
    security_status, AnswerEngine, AuditLog, CipherService, Classifier, ConsentLedger,
    DataLifecycleManager, EncryptedRecordStore, ErrorAnalysisLedger, KeyManager,
    KeyRotationCoordinator, QueryFailure, QueryPipeline, SecurityStatus,
};
use policyqa_domain::{AppConfig, PolicyQaError, QueryRequest, QueryResponse, Result};
use policyqa_infra::{
    DbManager, FileKeyStore, MaintenanceJob, MaintenanceReport, MaintenanceRoutine,
    MaintenanceScheduler, MaintenanceSchedulerConfig, RotationLock, SqlCipherAuditRepository,
    SqlCipherComplianceLogRepository, SqlCipherConsentRepository, SqlCipherErrorLedgerRepository,
    SqlCipherInteractionRepository,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::knowledge::{KeywordClassifier, KnowledgeBase};

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: AppConfig,
    pub db: Arc<DbManager>,
    pub audit: Arc<AuditLog>,
    pub cipher: Arc<CipherService>,
    pub rotation: Arc<KeyRotationCoordinator>,
    pub consent: Arc<ConsentLedger>,
    pub lifecycle: Arc<DataLifecycleManager>,
    pub errors: Arc<ErrorAnalysisLedger>,
    pub pipeline: Arc<QueryPipeline>,
    maintenance: Arc<MaintenanceRoutine>,
    scheduler: Mutex<Option<MaintenanceScheduler>>,
}

impl AppContext {
    /// Build the context with the built-in knowledge base as answer engine.
    pub async fn new_with_config(config: AppConfig) -> Result<Self> {
        Self::new_with_engines(
            config,
            Arc::new(KnowledgeBase::new()),
            Arc::new(KeywordClassifier::new()),
        )
        .await
    }

    /// Build the context around the given collaborators.
    ///
    /// Opens the encrypted database, applies the schema and loads (or
    /// creates) the active field-encryption key. Maintenance is not run
    /// here; see [`run_maintenance`](Self::run_maintenance).
    pub async fn new_with_engines(
        config: AppConfig,
        answers: Arc<dyn AnswerEngine>,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self> {
        let db = Arc::new(DbManager::new(
            &config.database.path,
            config.database.pool_size,
            config.database.encryption_key.as_deref(),
        )?);
        db.run_migrations()?;

        let mut key_store = FileKeyStore::new(&config.keys.directory);
        if let Some(passphrase) = &config.keys.passphrase {
            key_store = key_store.with_passphrase(passphrase.clone());
        }

        let interactions = Arc::new(SqlCipherInteractionRepository::new(Arc::clone(&db)));
        let logs = Arc::new(SqlCipherComplianceLogRepository::new(Arc::clone(&db)));
        let consents = Arc::new(SqlCipherConsentRepository::new(Arc::clone(&db)));
        let audit_sink = Arc::new(SqlCipherAuditRepository::new(Arc::clone(&db)));
        let error_repo = Arc::new(SqlCipherErrorLedgerRepository::new(Arc::clone(&db)));

        let security = &config.security;
        let audit = Arc::new(AuditLog::new(audit_sink, security.audit_log_level));
        let cipher = Arc::new(CipherService::new());
        let keys = Arc::new(KeyManager::new(Arc::new(key_store), security.key_rotation_days));
        let stores: Vec<Arc<dyn EncryptedRecordStore>> = vec![interactions.clone()];
        let rotation = Arc::new(KeyRotationCoordinator::new(
            keys,
            Arc::clone(&cipher),
            stores,
            Arc::clone(&audit),
        ));

        let active_key = rotation.initialize().await?;
        info!(key_id = %active_key, "encryption key loaded");

        let consent = Arc::new(ConsentLedger::new(
            consents,
            logs.clone(),
            Arc::clone(&audit),
            security.data_retention_days,
        ));
        let lifecycle = Arc::new(DataLifecycleManager::new(
            interactions.clone(),
            logs,
            Arc::clone(&consent),
            Arc::clone(&cipher),
            Arc::clone(&audit),
        ));
        let errors = Arc::new(ErrorAnalysisLedger::new(error_repo));

        let pipeline = Arc::new(
            QueryPipeline::new(
                Arc::clone(&consent),
                Arc::clone(&cipher),
                interactions,
                Arc::clone(&audit),
                Arc::clone(&errors),
                answers,
            )
            .with_classifier(classifier),
        );

        let maintenance = Arc::new(MaintenanceRoutine::new(
            Arc::clone(&rotation),
            Arc::clone(&lifecycle),
            security.data_retention_days,
            lock_dir_for(&config),
        ));

        Ok(Self {
            config,
            db,
            audit,
            cipher,
            rotation,
            consent,
            lifecycle,
            errors,
            pipeline,
            maintenance,
            scheduler: Mutex::new(None),
        })
    }

    /// Answer one question through the query pipeline
    pub async fn ask(
        &self,
        request: &QueryRequest,
    ) -> std::result::Result<QueryResponse, QueryFailure> {
        self.pipeline.handle(request).await
    }

    /// One maintenance pass: rotate the key if due, then purge interactions
    /// past the retention horizon.
    pub async fn run_maintenance(&self) -> Result<MaintenanceReport> {
        self.maintenance.run_once().await
    }

    /// Start the periodic maintenance scheduler. A no-op when maintenance is
    /// disabled or the scheduler is already running.
    pub async fn start_scheduler(&self) -> Result<()> {
        if !self.config.maintenance.enabled {
            info!("maintenance scheduler disabled");
            return Ok(());
        }

        let mut slot = self.scheduler.lock().await;
        if slot.as_ref().is_some_and(MaintenanceScheduler::is_running) {
            return Ok(());
        }

        let config = MaintenanceSchedulerConfig {
            cron_expression: self.config.maintenance.cron.clone(),
            ..MaintenanceSchedulerConfig::default()
        };
        let job: Arc<dyn MaintenanceJob> = self.maintenance.clone();
        let mut scheduler = MaintenanceScheduler::new(config, job)?;
        scheduler.start().await?;

        info!(cron = %self.config.maintenance.cron, "maintenance scheduler started");
        *slot = Some(scheduler);
        Ok(())
    }

    pub async fn scheduler_running(&self) -> bool {
        self.scheduler.lock().await.as_ref().is_some_and(MaintenanceScheduler::is_running)
    }

    pub fn security_status(&self) -> SecurityStatus {
        security_status(&self.cipher, &self.rotation, &self.audit, &self.config.security)
    }

    /// Run `SELECT 1` against the pool off the async runtime
    pub async fn check_database(&self) -> Result<()> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.health_check().map(|_| ()))
            .await
            .map_err(|e| PolicyQaError::Internal(format!("health check task failed: {e}")))?
    }

    /// Stop the scheduler, waiting for an in-flight maintenance pass to
    /// finish. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutdown called on AppContext");

        let Some(mut scheduler) = self.scheduler.lock().await.take() else {
            return Ok(());
        };
        if let Err(err) = scheduler.stop().await {
            warn!(error = %err, "maintenance scheduler stop failed");
            return Err(err.into());
        }
        Ok(())
    }
}

/// The rotation PID file lives next to the key directory
fn lock_dir_for(config: &AppConfig) -> PathBuf {
    RotationLock::path_for(&config.keys.directory)
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default()
}
