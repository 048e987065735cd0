//! Point-in-time view of the security layer

use chrono::{DateTime, Utc};
use policyqa_domain::SecurityConfig;
use serde::Serialize;

use super::cipher::CipherService;
use super::rotation::KeyRotationCoordinator;
use crate::audit::AuditLog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityStatus {
    pub encryption_enabled: bool,
    pub active_key_id: Option<String>,
    pub key_rotation_due: bool,
    pub rotation_deadline: Option<DateTime<Utc>>,
    pub audit_logging_enabled: bool,
    pub data_retention_days: u32,
    pub config: SecurityConfig,
}

pub fn security_status(
    cipher: &CipherService,
    rotation: &KeyRotationCoordinator,
    audit: &AuditLog,
    config: &SecurityConfig,
) -> SecurityStatus {
    SecurityStatus {
        encryption_enabled: cipher.is_ready(),
        active_key_id: cipher.active_key_id(),
        key_rotation_due: rotation.is_rotation_due(),
        rotation_deadline: rotation.rotation_deadline(),
        audit_logging_enabled: audit.level().admits(false),
        data_retention_days: config.data_retention_days,
        config: config.clone(),
    }
}
