//! Configuration structures
//!
//! `SecurityConfig` mirrors the recognised options of the security settings
//! file. Missing keys take their defaults and unknown keys are ignored, so a
//! partially written file still loads.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DATA_RETENTION_DAYS, DEFAULT_KEY_ROTATION_DAYS};

/// Minimum level at which audit entries are emitted to the tracing pipeline.
///
/// Successful actions are logged at `INFO`, failures at `WARNING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditLogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl AuditLogLevel {
    /// Whether an audit entry with the given outcome passes this level.
    pub fn admits(self, success: bool) -> bool {
        let entry_level = if success { Self::Info } else { Self::Warning };
        entry_level >= self
    }
}

impl fmt::Display for AuditLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// Security options for the encryption, audit and retention services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub key_rotation_days: u32,
    pub max_failed_attempts: u32,
    pub session_timeout_minutes: u32,
    pub data_retention_days: u32,
    pub audit_log_level: AuditLogLevel,
    pub require_https: bool,
    pub enable_rate_limiting: bool,
    pub max_queries_per_hour: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            key_rotation_days: DEFAULT_KEY_ROTATION_DAYS,
            max_failed_attempts: 5,
            session_timeout_minutes: 30,
            data_retention_days: DEFAULT_DATA_RETENTION_DAYS,
            audit_log_level: AuditLogLevel::Info,
            require_https: true,
            enable_rate_limiting: true,
            max_queries_per_hour: 100,
        }
    }
}

/// Database configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
    #[serde(default)]
    pub encryption_key: Option<String>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("path", &self.path)
            .field("pool_size", &self.pool_size)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "policyqa.db".to_string(), pool_size: 10, encryption_key: None }
    }
}

/// Location of the key artifacts and the optional passphrase that wraps them
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyStoreConfig {
    pub directory: PathBuf,
    #[serde(default)]
    pub passphrase: Option<String>,
}

impl fmt::Debug for KeyStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStoreConfig")
            .field("directory", &self.directory)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self { directory: PathBuf::from("keys"), passphrase: None }
    }
}

/// Periodic maintenance (rotation check and retention purge)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    pub enabled: bool,
    /// Six-field cron expression (seconds first)
    pub cron: String,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self { enabled: true, cron: "0 0 * * * *".to_string() }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub keys: KeyStoreConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}
