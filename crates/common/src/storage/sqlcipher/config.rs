//! SQLCipher connection pool configuration

use std::time::Duration;

/// r2d2 and per-connection settings for an encrypted pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlCipherPoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,

    /// How long `get` waits for a free connection
    pub connection_timeout: Duration,

    /// Busy timeout for SQLite lock contention
    pub busy_timeout: Duration,

    pub enable_wal: bool,

    pub enable_foreign_keys: bool,
}

impl SqlCipherPoolConfig {
    /// Default settings with the given pool size (clamped to at least one)
    pub fn with_max_size(max_size: u32) -> Self {
        Self { max_size: max_size.max(1), ..Self::default() }
    }
}

impl Default for SqlCipherPoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_millis(5000),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}
