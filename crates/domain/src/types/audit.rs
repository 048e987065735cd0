//! Audit trail entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One append-only audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub action: String,
    pub resource: String,
    pub success: bool,
}

impl AuditEntry {
    pub fn new(user_id: &str, action: &str, resource: &str, success: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
            success,
        }
    }
}
