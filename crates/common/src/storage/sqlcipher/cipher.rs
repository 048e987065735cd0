//! SQLCipher keying
//!
//! The key pragma must be the first statement on a fresh connection.

use rusqlite::Connection;
use tracing::{debug, error};

use crate::security::SecureString;
use crate::storage::error::{StorageError, StorageResult};

/// SQLCipher settings applied to every pooled connection
#[derive(Clone)]
pub struct SqlCipherConfig {
    pub key: SecureString,

    /// Cipher compatibility version (4 for SQLCipher 4.x)
    pub cipher_compatibility: i32,

    pub kdf_iter: i32,

    pub cipher_memory_security: bool,
}

impl std::fmt::Debug for SqlCipherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlCipherConfig")
            .field("key", &self.key)
            .field("cipher_compatibility", &self.cipher_compatibility)
            .field("kdf_iter", &self.kdf_iter)
            .field("cipher_memory_security", &self.cipher_memory_security)
            .finish()
    }
}

impl SqlCipherConfig {
    pub fn new(key: impl Into<SecureString>) -> Self {
        Self {
            key: key.into(),
            cipher_compatibility: 4,
            kdf_iter: 256_000,
            cipher_memory_security: true,
        }
    }
}

/// Key the connection and apply the cipher pragmas.
///
/// ```sql
/// PRAGMA key = '<encryption_key>';
/// PRAGMA cipher_compatibility = 4;
/// PRAGMA kdf_iter = 256000;
/// PRAGMA cipher_memory_security = ON;
/// ```
pub fn configure_sqlcipher(conn: &Connection, config: &SqlCipherConfig) -> StorageResult<()> {
    conn.pragma_update(None, "key", config.key.expose()).map_err(|e| {
        error!(error = %e, "SQLCipher key setup failed");
        StorageError::Encryption(format!("Failed to set encryption key: {e}"))
    })?;

    conn.pragma_update(None, "cipher_compatibility", config.cipher_compatibility)
        .map_err(|e| StorageError::Encryption(format!("Failed to set cipher_compatibility: {e}")))?;

    conn.pragma_update(None, "kdf_iter", config.kdf_iter)
        .map_err(|e| StorageError::Encryption(format!("Failed to set kdf_iter: {e}")))?;

    let memory_security = if config.cipher_memory_security { "ON" } else { "OFF" };
    conn.pragma_update(None, "cipher_memory_security", memory_security).map_err(|e| {
        StorageError::Encryption(format!("Failed to set cipher_memory_security: {e}"))
    })?;

    debug!("SQLCipher configuration applied");
    Ok(())
}

/// Force a page read so a wrong key surfaces before the pool is handed out.
///
/// # Errors
/// Returns `WrongKeyOrNotEncrypted` if the key does not open the file.
pub fn verify_encryption(conn: &Connection) -> StorageResult<()> {
    let result = conn
        .query_row("PRAGMA user_version", [], |_| Ok::<(), rusqlite::Error>(()))
        .and_then(|_| conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(())))
        .map_err(|e| {
            let lowered = e.to_string().to_lowercase();
            if lowered.contains("file is not a database")
                || lowered.contains("file is encrypted")
                || lowered.contains("database disk image is malformed")
                || lowered.contains("notadb")
                || lowered.contains("unsupported file format")
            {
                StorageError::WrongKeyOrNotEncrypted
            } else {
                StorageError::from(e)
            }
        });

    if let Err(e) = &result {
        error!(error = %e, "Encryption verification failed");
    }

    result
}
