//! Scheduling infrastructure for periodic maintenance
//!
//! The maintenance scheduler follows explicit lifecycle rules:
//! - Explicit start/stop
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout wrapping on all async operations

pub mod error;
pub mod maintenance_job;
pub mod maintenance_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use maintenance_job::{MaintenanceJob, MaintenanceReport, MaintenanceRoutine};
pub use maintenance_scheduler::{MaintenanceScheduler, MaintenanceSchedulerConfig};
