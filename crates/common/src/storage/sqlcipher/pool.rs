//! SQLCipher connection pool
//!
//! r2d2 pool whose init hook keys each connection and applies the pragmas.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info, instrument, warn};

use super::cipher::{configure_sqlcipher, verify_encryption, SqlCipherConfig};
use super::config::SqlCipherPoolConfig;
use super::connection::SqlCipherConnection;
use super::pragmas::apply_connection_pragmas;
use crate::storage::error::{StorageError, StorageResult};

/// Point-in-time pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolHealth {
    pub healthy: bool,
    pub connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
}

/// Pool of encrypted SQLite connections
#[derive(Debug)]
pub struct SqlCipherPool {
    pool: Pool<SqliteConnectionManager>,
    config: SqlCipherPoolConfig,
}

impl SqlCipherPool {
    /// Open (or create) the encrypted database at `path`.
    ///
    /// A test connection is checked out and verified before returning, so a
    /// wrong key fails here rather than on first use.
    ///
    /// # Errors
    /// - `WrongKeyOrNotEncrypted` if the key does not open an existing file
    /// - `Connection` if the file cannot be opened or the pool cannot be built
    #[instrument(skip(encryption_key), fields(db_path = ?path, pool_size = config.max_size))]
    pub fn new(
        path: &Path,
        encryption_key: String,
        config: SqlCipherPoolConfig,
    ) -> StorageResult<Self> {
        info!("Creating SQLCipher connection pool");

        let cipher_config = SqlCipherConfig::new(encryption_key);
        let pragma_config = config.clone();

        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            configure_sqlcipher(conn, &cipher_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            apply_connection_pragmas(conn, &pragma_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!("Failed to create connection pool: {}", e);
                StorageError::from_open_failure("Failed to create pool", e)
            })?;

        {
            let conn = pool.get().map_err(|e| {
                warn!("Failed to get test connection: {}", e);
                StorageError::from_open_failure("Failed to get test connection", e)
            })?;
            verify_encryption(&conn)?;
            debug!("Encryption verified successfully");
        }

        info!("SQLCipher pool created with {} connections", config.max_size);
        Ok(Self { pool, config })
    }

    /// Check out a connection, waiting up to the configured timeout.
    #[instrument(skip(self), fields(pool_size = self.config.max_size))]
    pub fn get_sqlcipher_connection(&self) -> StorageResult<SqlCipherConnection> {
        let start = std::time::Instant::now();

        match self.pool.get() {
            Ok(conn) => {
                debug!("Connection acquired in {}ms", start.elapsed().as_millis());
                Ok(SqlCipherConnection::new(conn))
            }
            Err(e) if e.to_string().to_lowercase().contains("timed out") => {
                warn!("Connection timeout after {:?}", self.config.connection_timeout);
                Err(StorageError::Timeout(self.config.connection_timeout.as_secs()))
            }
            Err(e) => {
                warn!("Connection error: {}", e);
                Err(StorageError::Connection(format!("Failed to get connection: {e}")))
            }
        }
    }

    pub fn health_check(&self) -> PoolHealth {
        let state = self.pool.state();
        PoolHealth {
            healthy: self.pool.get().is_ok(),
            connections: state.connections,
            idle_connections: state.idle_connections,
            max_connections: self.config.max_size,
        }
    }
}
