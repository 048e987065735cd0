//! Conversions from external infrastructure errors into domain errors.

use policyqa_common::storage::StorageError;
use policyqa_domain::PolicyQaError;
use rusqlite::Error as SqlError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub PolicyQaError);

impl From<InfraError> for PolicyQaError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<PolicyQaError> for InfraError {
    fn from(value: PolicyQaError) -> Self {
        InfraError(value)
    }
}

trait IntoPolicyQaError {
    fn into_policyqa(self) -> PolicyQaError;
}

fn looks_like_wrong_key(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("not a database") || lower.contains("encrypted")
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → PolicyQaError */
/* -------------------------------------------------------------------------- */

impl IntoPolicyQaError for SqlError {
    fn into_policyqa(self) -> PolicyQaError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => PolicyQaError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        PolicyQaError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        PolicyQaError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::NotADatabase, _) => PolicyQaError::Security(
                        "SQLCipher key rejected or database not encrypted".into(),
                    ),
                    (_, _) if looks_like_wrong_key(&message) => PolicyQaError::Security(
                        "SQLCipher key rejected or database not encrypted".into(),
                    ),
                    _ => PolicyQaError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => PolicyQaError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                PolicyQaError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                PolicyQaError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => PolicyQaError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => PolicyQaError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_policyqa())
    }
}

/* -------------------------------------------------------------------------- */
/* StorageError → PolicyQaError */
/* -------------------------------------------------------------------------- */

impl IntoPolicyQaError for StorageError {
    fn into_policyqa(self) -> PolicyQaError {
        match self {
            StorageError::WrongKeyOrNotEncrypted => {
                PolicyQaError::Security("SQLCipher key rejected or database not encrypted".into())
            }
            StorageError::Timeout(seconds) => {
                PolicyQaError::Database(format!("database timeout after {seconds}s"))
            }
            StorageError::Rusqlite(sql_err) => sql_err.into_policyqa(),
            StorageError::InvalidConfig(message) => PolicyQaError::Config(message),
            StorageError::SchemaVersionMismatch { expected, found } => PolicyQaError::Database(
                format!("schema version mismatch (expected {expected}, found {found})"),
            ),
            StorageError::Connection(message)
            | StorageError::Query(message)
            | StorageError::Encryption(message)
            | StorageError::Migration(message) => PolicyQaError::Database(message),
            StorageError::Common(common_err) => PolicyQaError::Database(common_err.to_string()),
            StorageError::Io(io_err) => PolicyQaError::Database(io_err.to_string()),
            StorageError::R2d2(r2d2_err) => PolicyQaError::Database(r2d2_err.to_string()),
            StorageError::SerdeJson(json_err) => PolicyQaError::Database(json_err.to_string()),
        }
    }
}

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        InfraError(value.into_policyqa())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → PolicyQaError */
/* -------------------------------------------------------------------------- */

impl IntoPolicyQaError for std::io::Error {
    fn into_policyqa(self) -> PolicyQaError {
        match self.kind() {
            std::io::ErrorKind::NotFound => PolicyQaError::NotFound(self.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                PolicyQaError::Security(format!("permission denied: {self}"))
            }
            _ => PolicyQaError::Internal(format!("I/O error: {self}")),
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_policyqa())
    }
}

/* -------------------------------------------------------------------------- */
/* Helpers used by repositories */
/* -------------------------------------------------------------------------- */

pub(crate) fn map_storage_error(err: StorageError) -> PolicyQaError {
    InfraError::from(err).into()
}

pub(crate) fn map_join_error(err: JoinError) -> PolicyQaError {
    if err.is_cancelled() {
        PolicyQaError::Internal("blocking task cancelled".into())
    } else {
        PolicyQaError::Internal(format!("blocking task failed: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
