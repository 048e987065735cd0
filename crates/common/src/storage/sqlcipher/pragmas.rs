//! Per-connection pragmas, applied after the key on every pooled connection

use rusqlite::Connection;

use super::config::SqlCipherPoolConfig;
use crate::storage::error::{StorageError, StorageResult};

/// Pages freed by a delete are overwritten with zeros so erased user
/// records do not linger in the file.
const SECURE_DELETE: &str = "secure_delete";

/// Apply journal, durability, erasure and locking pragmas to `conn`.
pub fn apply_connection_pragmas(
    conn: &Connection,
    config: &SqlCipherPoolConfig,
) -> StorageResult<()> {
    let set = |name: &str, value: &dyn rusqlite::ToSql| {
        conn.pragma_update(None, name, value)
            .map_err(|e| StorageError::Query(format!("PRAGMA {name} failed: {e}")))
    };

    if config.enable_wal {
        set("journal_mode", &"WAL")?;
        set("wal_autocheckpoint", &1000)?;
    }
    set("synchronous", &"NORMAL")?;
    set(SECURE_DELETE, &"ON")?;
    set("foreign_keys", &if config.enable_foreign_keys { "ON" } else { "OFF" })?;

    conn.busy_timeout(config.busy_timeout)
        .map_err(|e| StorageError::Query(format!("busy timeout failed: {e}")))
}
