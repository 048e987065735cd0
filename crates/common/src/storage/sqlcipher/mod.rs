//! SQLCipher backend
//!
//! r2d2 connection pool over SQLCipher encrypted databases.

pub mod cipher;
pub mod config;
pub mod connection;
pub mod pool;
pub mod pragmas;

pub use cipher::{configure_sqlcipher, verify_encryption, SqlCipherConfig};
pub use config::SqlCipherPoolConfig;
pub use connection::{SqlCipherConnection, SqlCipherStatement};
pub use pool::{PoolHealth, SqlCipherPool};
pub use pragmas::apply_connection_pragmas;
