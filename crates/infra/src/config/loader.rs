//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Searches the standard paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `POLICYQA_DB_PATH`: Database file path (required)
//! - `POLICYQA_DB_POOL_SIZE`: Connection pool size (required)
//! - `POLICYQA_DB_ENCRYPTION_KEY`: SQLCipher key
//! - `POLICYQA_KEY_DIR`: Directory holding key artifacts
//! - `POLICYQA_KEY_PASSPHRASE`: Passphrase sealing key artifacts
//! - `POLICYQA_SECURITY_CONFIG`: Path to the security settings file
//! - `POLICYQA_MAINTENANCE_CRON`: Six-field cron for periodic maintenance
//! - `POLICYQA_MAINTENANCE_ENABLED`: Whether maintenance runs (true/false)
//!
//! ## File Locations
//! The loader searches `config.{json,toml}` and `policyqa.{json,toml}` in the
//! working directory, its two parents and next to the executable.

use std::path::{Path, PathBuf};

use policyqa_domain::{
    AppConfig, DatabaseConfig, KeyStoreConfig, MaintenanceConfig, PolicyQaError, Result,
    SecurityConfig,
};
use serde::de::DeserializeOwned;

const CONFIG_STEMS: [&str; 2] = ["config", "policyqa"];
const CONFIG_EXTENSIONS: [&str; 2] = ["json", "toml"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `PolicyQaError::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<AppConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `PolicyQaError::Config` if a required variable is missing or a
/// value does not parse.
pub fn load_from_env() -> Result<AppConfig> {
    let path = env_var("POLICYQA_DB_PATH")?;
    let pool_size = env_var("POLICYQA_DB_POOL_SIZE").and_then(|s| {
        s.parse::<u32>().map_err(|e| PolicyQaError::Config(format!("Invalid pool size: {e}")))
    })?;

    let keys = KeyStoreConfig {
        directory: std::env::var("POLICYQA_KEY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| KeyStoreConfig::default().directory),
        passphrase: std::env::var("POLICYQA_KEY_PASSPHRASE").ok(),
    };

    let security = match std::env::var("POLICYQA_SECURITY_CONFIG") {
        Ok(path) => load_security_config(Path::new(&path)),
        Err(_) => SecurityConfig::default(),
    };

    let default_maintenance = MaintenanceConfig::default();
    let maintenance = MaintenanceConfig {
        enabled: env_bool("POLICYQA_MAINTENANCE_ENABLED", default_maintenance.enabled),
        cron: std::env::var("POLICYQA_MAINTENANCE_CRON").unwrap_or(default_maintenance.cron),
    };

    Ok(AppConfig {
        database: DatabaseConfig {
            path,
            pool_size,
            encryption_key: std::env::var("POLICYQA_DB_ENCRYPTION_KEY").ok(),
        },
        keys,
        security,
        maintenance,
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations.
///
/// # Errors
/// Returns `PolicyQaError::Config` if the file is missing, unreadable or
/// does not parse.
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(PolicyQaError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => discover_config_path().ok_or_else(|| {
            PolicyQaError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| PolicyQaError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Load the security settings file.
///
/// Never fails: a missing file yields the defaults, and so does a malformed
/// one (with a warning). Missing keys take their defaults.
pub fn load_security_config(path: &Path) -> SecurityConfig {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No security config file, using defaults");
            return SecurityConfig::default();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable security config, using defaults");
            return SecurityConfig::default();
        }
    };

    match parse_config(&contents, path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Malformed security config, using defaults");
            SecurityConfig::default()
        }
    }
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config<T: DeserializeOwned>(contents: &str, path: &Path) -> Result<T> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| PolicyQaError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| PolicyQaError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(PolicyQaError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Search the standard paths for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn discover_config_path() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| {
            CONFIG_STEMS.iter().flat_map(move |stem| {
                CONFIG_EXTENSIONS.iter().map(move |ext| root.join(format!("{stem}.{ext}")))
            })
        })
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        PolicyQaError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
/// Unrecognised values fall back to `default`.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
