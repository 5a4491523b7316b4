/*!
 * Error handling for the keyfix reconciliation crate
 *
 * Provides the error taxonomy used by the derivation engine, the
 * reconciliation driver and the record stores, with error codes,
 * user-friendly messages and suggested remediation.
 */

use std::collections::HashMap;
use thiserror::Error;

/// Error type for all keyfix operations
#[derive(Debug, Error)]
pub enum KeyfixError {
    #[error("Keyring parse failed: {cause}")]
    ParseFailure { cause: String, error_code: u32 },

    #[error("Key for identity not found: {address}")]
    IdentityNotFound {
        address: String,
        available: Vec<String>,
        error_code: u32,
    },

    #[error("Key id missing for identity: {address}")]
    EmptyKeyId { address: String, error_code: u32 },

    #[error("Persistence failed: {operation} - {cause}")]
    PersistenceFailure {
        operation: String,
        cause: String,
        error_code: u32,
        context: HashMap<String, String>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Error code constants for different error categories
pub mod error_codes {
    // Keyring errors: 1000-1999
    pub const KEYRING_PARSE_FAILED: u32 = 1001;
    pub const KEYRING_EMPTY: u32 = 1002;
    pub const SELF_SIGNATURE_MISSING: u32 = 1003;
    pub const UNKNOWN_CRITICAL_SUBPACKET: u32 = 1004;

    // Identity errors: 2000-2999
    pub const IDENTITY_NOT_FOUND: u32 = 2001;
    pub const KEY_ID_EMPTY: u32 = 2002;

    // Persistence errors: 3000-3999
    pub const STORE_OPEN_FAILED: u32 = 3001;
    pub const STORE_QUERY_FAILED: u32 = 3002;
    pub const STORE_UPDATE_FAILED: u32 = 3003;
    pub const STORE_ROW_COUNT_MISMATCH: u32 = 3004;
    pub const STORE_INSERT_FAILED: u32 = 3005;

    // Ambient errors: 9000-9999
    pub const CONFIG_INVALID: u32 = 9001;
    pub const SERIALIZATION_FAILED: u32 = 9002;
    pub const IO_FAILED: u32 = 9003;
}

impl KeyfixError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            KeyfixError::ParseFailure { error_code, .. } => *error_code,
            KeyfixError::IdentityNotFound { error_code, .. } => *error_code,
            KeyfixError::EmptyKeyId { error_code, .. } => *error_code,
            KeyfixError::PersistenceFailure { error_code, .. } => *error_code,
            KeyfixError::ConfigError(_) => error_codes::CONFIG_INVALID,
            KeyfixError::SerializationError(_) => error_codes::SERIALIZATION_FAILED,
            KeyfixError::IoError(_) => error_codes::IO_FAILED,
        }
    }

    /// Get the error category/type as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            KeyfixError::ParseFailure { .. } => "ParseFailure",
            KeyfixError::IdentityNotFound { .. } => "IdentityNotFound",
            KeyfixError::EmptyKeyId { .. } => "EmptyKeyId",
            KeyfixError::PersistenceFailure { .. } => "PersistenceFailure",
            KeyfixError::ConfigError(_) => "ConfigError",
            KeyfixError::SerializationError(_) => "SerializationError",
            KeyfixError::IoError(_) => "IoError",
        }
    }

    /// Whether the error only affects the record being reconciled.
    ///
    /// Record-level errors are logged and skipped; everything else stops
    /// the batch.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            KeyfixError::ParseFailure { .. }
                | KeyfixError::IdentityNotFound { .. }
                | KeyfixError::EmptyKeyId { .. }
        )
    }

    /// Get a user-friendly error message
    pub fn user_friendly_message(&self) -> String {
        match self {
            KeyfixError::ParseFailure { .. } => {
                "The stored keyring could not be read as OpenPGP key material.".to_string()
            }
            KeyfixError::IdentityNotFound {
                address, available, ..
            } => {
                if available.is_empty() {
                    format!("The keyring holds no identities, so '{}' cannot be matched.", address)
                } else {
                    format!(
                        "No identity in the keyring matches '{}'. Found: {}.",
                        address,
                        available.join(", ")
                    )
                }
            }
            KeyfixError::EmptyKeyId { address, .. } => {
                format!("The key bound to '{}' has no usable key id.", address)
            }
            KeyfixError::PersistenceFailure { operation, .. } => {
                format!(
                    "Store operation '{}' failed. Remaining records were not processed.",
                    operation
                )
            }
            KeyfixError::ConfigError(_) => {
                "The configuration could not be loaded. Check the file and flags.".to_string()
            }
            KeyfixError::SerializationError(_) => {
                "Data serialization failed. Data format may be corrupted.".to_string()
            }
            KeyfixError::IoError(_) => {
                "Input/output operation failed. Check file permissions and paths.".to_string()
            }
        }
    }

    /// Get technical details for debugging
    pub fn technical_details(&self) -> HashMap<String, String> {
        let mut details = HashMap::new();

        details.insert("error_code".to_string(), self.error_code().to_string());
        details.insert("error_type".to_string(), self.error_type().to_string());
        details.insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339());

        match self {
            KeyfixError::ParseFailure { cause, .. } => {
                details.insert("cause".to_string(), cause.clone());
            }
            KeyfixError::IdentityNotFound {
                address, available, ..
            } => {
                details.insert("address".to_string(), address.clone());
                details.insert("available".to_string(), available.join(" "));
            }
            KeyfixError::EmptyKeyId { address, .. } => {
                details.insert("address".to_string(), address.clone());
            }
            KeyfixError::PersistenceFailure {
                operation,
                cause,
                context,
                ..
            } => {
                details.insert("operation".to_string(), operation.clone());
                details.insert("cause".to_string(), cause.clone());
                details.extend(context.clone());
            }
            _ => {
                details.insert("details".to_string(), self.to_string());
            }
        }

        details
    }

    /// Get suggested remediation steps
    pub fn suggested_remediation(&self) -> Option<String> {
        match self {
            KeyfixError::ParseFailure { error_code, .. } => match *error_code {
                error_codes::KEYRING_EMPTY => {
                    Some("Ask the owner to upload their public key again.".to_string())
                }
                _ => Some(
                    "Re-import the key from the owner; unsupported algorithms or critical \
                     subpackets cannot be handled."
                        .to_string(),
                ),
            },
            KeyfixError::IdentityNotFound { .. } => Some(
                "Check whether the stored address differs from the User IDs on the key."
                    .to_string(),
            ),
            KeyfixError::PersistenceFailure { error_code, .. } => match *error_code {
                error_codes::STORE_ROW_COUNT_MISMATCH => Some(
                    "The record changed while the pass was running. Re-run the pass.".to_string(),
                ),
                _ => Some("Check database connectivity and permissions, then re-run.".to_string()),
            },
            KeyfixError::ConfigError(_) => {
                Some("Validate the JSON configuration file against the documented keys.".to_string())
            }
            _ => None,
        }
    }
}

/// Convenience constructors for common error types
impl KeyfixError {
    pub fn parse_failure(cause: &str, error_code: u32) -> Self {
        KeyfixError::ParseFailure {
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn identity_not_found(address: &str, available: Vec<String>) -> Self {
        KeyfixError::IdentityNotFound {
            address: address.to_string(),
            available,
            error_code: error_codes::IDENTITY_NOT_FOUND,
        }
    }

    pub fn empty_key_id(address: &str) -> Self {
        KeyfixError::EmptyKeyId {
            address: address.to_string(),
            error_code: error_codes::KEY_ID_EMPTY,
        }
    }

    pub fn persistence_failure(operation: &str, cause: &str, error_code: u32) -> Self {
        KeyfixError::PersistenceFailure {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
            context: HashMap::new(),
        }
    }

    /// Persistence failure tied to one record, for diagnostics
    pub fn record_persistence_failure(
        operation: &str,
        cause: &str,
        error_code: u32,
        owner: &str,
        address: &str,
        key_id: &str,
    ) -> Self {
        let mut context = HashMap::new();
        context.insert("owner".to_string(), owner.to_string());
        context.insert("address".to_string(), address.to_string());
        context.insert("key_id".to_string(), key_id.to_string());

        KeyfixError::PersistenceFailure {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
            context,
        }
    }

    /// Attach a diagnostic key/value to a persistence failure
    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        if let KeyfixError::PersistenceFailure { context, .. } = &mut self {
            context.insert(key.to_string(), value.to_string());
        }
        self
    }
}

// From implementations for automatic error conversion
impl From<std::io::Error> for KeyfixError {
    fn from(err: std::io::Error) -> Self {
        KeyfixError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for KeyfixError {
    fn from(err: serde_json::Error) -> Self {
        KeyfixError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for KeyfixError {
    fn from(err: rusqlite::Error) -> Self {
        KeyfixError::persistence_failure("query", &err.to_string(), error_codes::STORE_QUERY_FAILED)
    }
}

/// Result type alias for keyfix operations
pub type KeyfixResult<T> = Result<T, KeyfixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_generation() {
        let error = KeyfixError::parse_failure("no armored data found", error_codes::KEYRING_PARSE_FAILED);
        assert_eq!(error.error_code(), error_codes::KEYRING_PARSE_FAILED);
        assert_eq!(error.error_type(), "ParseFailure");
    }

    #[test]
    fn test_record_level_classification() {
        assert!(KeyfixError::empty_key_id("bob@x.com").is_record_level());
        assert!(KeyfixError::identity_not_found("bob@x.com", vec![]).is_record_level());
        assert!(!KeyfixError::persistence_failure(
            "update",
            "connection reset",
            error_codes::STORE_UPDATE_FAILED
        )
        .is_record_level());
    }

    #[test]
    fn test_user_friendly_message_lists_addresses() {
        let error = KeyfixError::identity_not_found(
            "c@x.com",
            vec!["a@x.com".to_string(), "b@x.com".to_string()],
        );
        let message = error.user_friendly_message();
        assert!(message.contains("a@x.com, b@x.com"));

        let error = KeyfixError::identity_not_found("c@x.com", vec![]);
        assert!(error.user_friendly_message().contains("no identities"));
    }

    #[test]
    fn test_technical_details() {
        let error = KeyfixError::record_persistence_failure(
            "update",
            "expected 1 row, updated 0",
            error_codes::STORE_ROW_COUNT_MISMATCH,
            "bob",
            "bob@x.com",
            "DEADBEEF",
        );
        let details = error.technical_details();
        assert_eq!(details.get("owner").map(String::as_str), Some("bob"));
        assert!(details.contains_key("operation"));
        assert!(details.contains_key("cause"));
    }

    #[test]
    fn test_remediation_suggestions() {
        let error = KeyfixError::persistence_failure(
            "update",
            "expected 1 row, updated 0",
            error_codes::STORE_ROW_COUNT_MISMATCH,
        );
        let suggestion = error.suggested_remediation();
        assert!(suggestion.is_some());
        assert!(suggestion.unwrap().contains("Re-run"));
    }
}
