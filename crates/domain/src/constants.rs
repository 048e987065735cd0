//! Application constants
//!
//! Centralized location for domain-level constants shared by the security and
//! compliance services.

// Key management
pub const KEY_ALGORITHM: &str = "AES-256-GCM";
pub const KEY_LENGTH_BYTES: usize = 32;
pub const DEFAULT_KEY_ROTATION_DAYS: u32 = 90;

// Cipher format: `pqa$1$<key_id>$<payload>`
pub const CIPHERTEXT_MARKER: &str = "pqa$1$";
pub const CIPHERTEXT_SEPARATOR: char = '$';
pub const DECRYPTION_ERROR_SENTINEL: &str = "[DECRYPTION_ERROR]";

// Retention and consent
pub const DEFAULT_DATA_RETENTION_DAYS: u32 = 2555; // 7 years
pub const PRIVACY_POLICY_VERSION: &str = "1.0";
pub const PRIVACY_POLICY_LAST_UPDATED: &str = "2025-09-15";
pub const DEFAULT_CONSENT_TYPE: &str = "data_processing";
pub const DEFAULT_CONSENT_PURPOSES: [&str; 3] = ["service_provision", "analytics", "security"];
pub const ANONYMIZED_OWNER: &str = "ANONYMIZED";
pub const ANONYMOUS_USER: &str = "anonymous";
pub const SYSTEM_ACTOR: &str = "system";

// Input validation
pub const MAX_INPUT_CHARS: usize = 1000;
pub const BLOCKED_INPUT_FRAGMENTS: [&str; 8] = ["'", "\"", ";", "--", "/*", "*/", "xp_", "sp_"];

// Session tokens: 32 random bytes, URL-safe base64 without padding
pub const SESSION_TOKEN_BYTES: usize = 32;
pub const SESSION_TOKEN_LENGTH: usize = 43;

// Error analysis
pub const ALERT_WINDOW_HOURS: i64 = 1;
pub const PATTERN_MESSAGE_PREFIX_CHARS: usize = 100;
pub const PATTERN_SAMPLE_MESSAGE_CHARS: usize = 500;
pub const PATTERN_SAMPLE_TRACE_CHARS: usize = 1000;
pub const SUMMARY_RECENT_ERRORS: usize = 50;
pub const SUMMARY_TOP_PATTERNS: usize = 10;
pub const HIGH_ERROR_RATE_ALERT: &str = "high_error_rate";
pub const UNKNOWN_CLIENT: &str = "unknown";

// Audit trail
pub const DEFAULT_AUDIT_PAGE: usize = 100;
