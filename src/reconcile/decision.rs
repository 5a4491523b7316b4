// Per-record reconciliation decision

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::KeyfixError;
use crate::keyring::{derive_key_info, DerivedKeyInfo, Expiration, KeyId, KeyIdMatch};
use crate::store::StoredRecord;

/// Why a record could not be reconciled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// The key-ring could not be parsed
    ParseFailure { cause: String },
    /// No User ID matches the record's address
    IdentityNotFound { available: Vec<String> },
    /// A User ID matched but its key has no usable key id
    EmptyKeyId,
}

impl FailureReason {
    /// Classify a derivation error
    pub fn from_error(err: &KeyfixError) -> Self {
        match err {
            KeyfixError::IdentityNotFound { available, .. } => FailureReason::IdentityNotFound {
                available: available.clone(),
            },
            KeyfixError::EmptyKeyId { .. } => FailureReason::EmptyKeyId,
            KeyfixError::ParseFailure { cause, .. } => FailureReason::ParseFailure {
                cause: cause.clone(),
            },
            other => FailureReason::ParseFailure {
                cause: other.to_string(),
            },
        }
    }

    /// Short label used in statistics
    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::ParseFailure { .. } => "parse_failure",
            FailureReason::IdentityNotFound { .. } => "identity_not_found",
            FailureReason::EmptyKeyId => "empty_key_id",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ParseFailure { cause } => write!(f, "{}", cause),
            FailureReason::IdentityNotFound { available } if available.is_empty() => {
                f.write_str("Key for identity not found (no identities)")
            }
            FailureReason::IdentityNotFound { available } => {
                write!(f, "Key for identity not found (identities: {})", available.join(" "))
            }
            FailureReason::EmptyKeyId => f.write_str("KEY MISSING"),
        }
    }
}

/// What to do with a stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Stored key id and expiration already match the key-ring
    NoChange,
    /// Overwrite the stored key id and expiration
    Update {
        key_id: KeyId,
        expiration: Expiration,
        /// How the stored key id related to the derived one
        key_id_match: KeyIdMatch,
    },
    /// The key-ring gave no usable answer
    Failed(FailureReason),
}

/// Decide on a record given what its key-ring derives to.
///
/// The record is left alone only when the expirations agree to the second
/// and the stored key id is already the exact 16-digit rendering. Any
/// other case, including a stored key id of a different key, updates the
/// record to the derived values.
///
/// A key-ring whose key id has no bytes never reaches this point; it fails
/// derivation with `EmptyKeyId`.
pub fn decide(record: &StoredRecord, derived: &DerivedKeyInfo) -> Decision {
    let key_id_match = derived.key_id.compare_stored(&record.stored_key_id);

    if record.stored_expiration.same_second(&derived.expiration)
        && derived.key_id == record.stored_key_id.as_str()
    {
        return Decision::NoChange;
    }

    Decision::Update {
        key_id: derived.key_id.clone(),
        expiration: derived.expiration,
        key_id_match,
    }
}

/// Derive from the record's own key-ring and decide
pub fn reconcile_record(record: &StoredRecord) -> Decision {
    match derive_key_info(&record.keyring, &record.address) {
        Ok(derived) => decide(record, &derived),
        Err(err) => Decision::Failed(FailureReason::from_error(&err)),
    }
}
