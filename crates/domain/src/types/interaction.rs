//! Persisted question/answer interactions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored interaction row.
///
/// `query` and `answer` hold the stored form: cipher-format text for rows
/// written after encryption rollout, plaintext for legacy rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: i64,
    pub query: String,
    pub answer: String,
    pub category: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub session_id: String,
    pub ip_address: String,
    pub user_agent: String,
}

/// Insert payload for [`InteractionRecord`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInteraction {
    pub query: String,
    pub answer: String,
    pub category: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub session_id: String,
    pub ip_address: String,
    pub user_agent: String,
}

/// Decrypted view of an interaction for data exports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedInteraction {
    pub query: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
    pub category: Option<String>,
}

/// Inbound question from the request layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub user_id: String,
    pub session_id: String,
    pub ip_address: String,
    pub user_agent: String,
    pub question: String,
}

/// Answer returned to the request layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub category: Option<String>,
}
