//! # PolicyQA Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLCipher database manager and repositories for every storage port
//! - File-backed key artifact store
//! - Configuration loading (environment first, then JSON/TOML file)
//! - The cross-process rotation lock and the maintenance scheduler
//!
//! ## Architecture
//! - Implements traits defined in `policyqa-core`
//! - Depends on `policyqa-common`, `policyqa-domain` and `policyqa-core`
//! - Contains all "impure" code (database, filesystem, timers)

pub mod config;
pub mod database;
pub mod errors;
pub mod keystore;
pub mod rotation_lock;
pub mod scheduling;

pub use database::*;
pub use errors::InfraError;
pub use keystore::FileKeyStore;
pub use rotation_lock::RotationLock;
pub use scheduling::{
    MaintenanceJob, MaintenanceReport, MaintenanceRoutine, MaintenanceScheduler,
    MaintenanceSchedulerConfig, SchedulerError, SchedulerResult,
};
