//! The periodic maintenance routine: key rotation check, then retention purge

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use policyqa_core::{DataLifecycleManager, KeyRotationCoordinator, RotationOutcome};
use policyqa_domain::Result;
use tracing::{error, info, instrument};

use crate::errors::InfraError;
use crate::rotation_lock::RotationLock;

/// A unit of work the maintenance scheduler fires on each tick
#[async_trait]
pub trait MaintenanceJob: Send + Sync {
    async fn run(&self) -> std::result::Result<(), InfraError>;
}

/// What one maintenance pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub rotated: bool,
    pub purged: u64,
}

/// Rotates keys when due (under the cross-process lock) and purges
/// interactions past the retention horizon.
pub struct MaintenanceRoutine {
    rotation: Arc<KeyRotationCoordinator>,
    lifecycle: Arc<DataLifecycleManager>,
    retention_days: u32,
    lock_dir: PathBuf,
}

impl MaintenanceRoutine {
    pub fn new(
        rotation: Arc<KeyRotationCoordinator>,
        lifecycle: Arc<DataLifecycleManager>,
        retention_days: u32,
        lock_dir: impl Into<PathBuf>,
    ) -> Self {
        Self { rotation, lifecycle, retention_days, lock_dir: lock_dir.into() }
    }

    /// Run one pass. The purge still runs when the rotation step fails; a
    /// rotation error is reported ahead of a purge error.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<MaintenanceReport> {
        let rotation = self.rotate_if_due().await;
        if let Err(err) = &rotation {
            error!(error = %err, "maintenance.rotation_failed");
        }

        let purge = self.lifecycle.purge_expired(self.retention_days).await;
        let rotated = rotation?;
        let purged = purge?;

        info!(rotated, purged, "maintenance.completed");
        Ok(MaintenanceReport { rotated, purged })
    }

    async fn rotate_if_due(&self) -> Result<bool> {
        if !self.rotation.is_rotation_due() {
            return Ok(false);
        }

        let _lock = RotationLock::acquire(&self.lock_dir)?;
        let outcome = self.rotation.rotate_if_due().await?;
        if let RotationOutcome::Rotated(report) = &outcome {
            info!(
                new_key_id = %report.new_key_id,
                migrated = report.migrated,
                skipped = report.skipped,
                "maintenance.rotated"
            );
        }
        Ok(outcome.rotated())
    }
}

#[async_trait]
impl MaintenanceJob for MaintenanceRoutine {
    async fn run(&self) -> std::result::Result<(), InfraError> {
        self.run_once().await.map(|_| ()).map_err(InfraError::from)
    }
}
