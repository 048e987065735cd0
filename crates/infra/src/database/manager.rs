//! Database connection manager backed by the shared SQLCipher pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use policyqa_common::storage::{
    PoolHealth, SqlCipherConnection, SqlCipherPool, SqlCipherPoolConfig, StorageError,
};
use policyqa_domain::{PolicyQaError, Result};
use rusqlite::{params, OptionalExtension};
use tracing::info;

use crate::errors::{map_storage_error, InfraError};

pub(crate) const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database manager that wraps an [`SqlCipherPool`].
pub struct DbManager {
    pool: Arc<SqlCipherPool>,
    path: PathBuf,
}

impl DbManager {
    /// Open the encrypted database with the given pool size and SQLCipher key.
    ///
    /// # Errors
    /// `Security` when no key is given or the key does not open the file.
    pub fn new<P: AsRef<Path>>(
        db_path: P,
        pool_size: u32,
        encryption_key: Option<&str>,
    ) -> Result<Self> {
        let key = encryption_key.map(str::to_owned).ok_or_else(|| {
            PolicyQaError::Security("database encryption key not provided".into())
        })?;

        let path = db_path.as_ref().to_path_buf();
        let config = SqlCipherPoolConfig::with_max_size(pool_size);
        let pool = SqlCipherPool::new(&path, key, config).map(Arc::new).map_err(map_storage_error)?;

        info!(
            db_path = %path.display(),
            max_connections = pool.health_check().max_connections,
            "sqlcipher pool initialised"
        );

        Ok(Self { pool, path })
    }

    /// Acquire a SQLCipher connection from the pool.
    pub fn get_connection(&self) -> Result<SqlCipherConnection> {
        self.pool.get_sqlcipher_connection().map_err(map_storage_error)
    }

    /// Ensure the full schema exists on the current database. Runs in one
    /// transaction; nothing is applied when any step fails.
    ///
    /// # Errors
    /// Fails if the file was written by a newer schema version.
    pub fn run_migrations(&self) -> Result<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction().map_err(|e| migration_error(e, "begin"))?;
        create_schema(&tx)?;
        tx.commit().map_err(|e| migration_error(StorageError::from(e), "commit"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify the database answers a trivial query and report pool occupancy.
    pub fn health_check(&self) -> Result<PoolHealth> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0))
            .map_err(map_storage_error)?;
        drop(conn);
        Ok(self.pool.health_check())
    }
}

fn create_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;

    let found: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .optional()
        .map_err(map_sql_error)?
        .flatten();
    if let Some(found) = found.filter(|found| *found > SCHEMA_VERSION) {
        return Err(map_storage_error(StorageError::SchemaVersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }));
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER) * 1000)",
        params![SCHEMA_VERSION],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

fn migration_error(err: StorageError, step: &str) -> PolicyQaError {
    map_storage_error(err.with_operation(format!("run_migrations: {step}")))
}

fn map_sql_error(err: rusqlite::Error) -> PolicyQaError {
    PolicyQaError::from(InfraError::from(err))
}
