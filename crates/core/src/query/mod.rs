//! Question handling: consent gate, validation, answering and encrypted
//! persistence

pub mod ports;
pub mod service;

pub use ports::{AnswerEngine, Classifier};
pub use service::{QueryFailure, QueryPipeline};
