//! Error events, pattern aggregation, threshold alerts and performance samples

pub mod ledger;
pub mod ports;

pub use ledger::{pattern_fingerprint, ErrorAnalysisLedger};
pub use ports::ErrorLedgerRepository;
