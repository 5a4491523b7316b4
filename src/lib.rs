/*!
 * Keyfix: OpenPGP key record reconciliation
 *
 * This crate repairs stored OpenPGP key metadata. Each record in a store
 * carries an owner, an address, a key id, an expiration and the serialized
 * key-ring the owner uploaded. The key id and expiration were recorded at
 * upload time and can be wrong: truncated to the short form, left at the
 * epoch-zero "unset" value, or describing an older key.
 *
 * The main pieces are:
 *
 * - The key parser and derivation engine, which finds the User ID bound to
 *   an address and reads the key id and expiration its self-signature
 *   attests to
 * - The reconciliation driver, which compares those values with what is
 *   stored and reports or applies corrections
 * - Record stores: an in-memory store and a SQLite store
 *
 * Record-level problems (unparseable key-rings, missing identities) are
 * reported and skipped. A failed write stops the pass.
 */

/// Run settings loaded from JSON
pub mod config;

/// Error types for keyfix operations
pub mod error;

/// Key-ring parsing, key id rendering and expiration derivation
pub mod keyring;

/// Reconciliation decisions, driver and reports
pub mod reconcile;

/// Record stores
pub mod store;

#[cfg(test)]
mod testutil;

// Re-export main types for convenience
pub use error::KeyfixError;
pub use error::KeyfixResult;
pub use keyring::derive_key_info;
pub use keyring::inspect_keyring;
pub use keyring::DerivedKeyInfo;
pub use keyring::Expiration;
pub use keyring::KeyId;
pub use keyring::KeyIdMatch;
pub use reconcile::Decision;
pub use reconcile::ReconcileConfig;
pub use reconcile::ReconcileReport;
pub use reconcile::Reconciler;
pub use store::RecordStore;
pub use store::StoredRecord;

/// The most commonly used types in one import.
///
/// ```
/// use keyfix::prelude::*;
///
/// let store = MemoryRecordStore::new();
/// let mut reconciler = Reconciler::new(store, ReconcileConfig::dry_run());
/// let report = reconciler.run()?;
/// assert_eq!(report.statistics.examined, 0);
/// # Ok::<(), KeyfixError>(())
/// ```
pub mod prelude {
    pub use crate::config::OutputFormat;
    pub use crate::config::Settings;
    pub use crate::error::error_codes;
    pub use crate::error::KeyfixError;
    pub use crate::error::KeyfixResult;
    pub use crate::keyring::derive_key_info;
    pub use crate::keyring::inspect_keyring;
    pub use crate::keyring::DerivedKeyInfo;
    pub use crate::keyring::Expiration;
    pub use crate::keyring::KeyId;
    pub use crate::keyring::KeyIdMatch;
    pub use crate::keyring::KeyringEntry;
    pub use crate::reconcile::decide;
    pub use crate::reconcile::reconcile_record;
    pub use crate::reconcile::Decision;
    pub use crate::reconcile::FailureReason;
    pub use crate::reconcile::OutcomeKind;
    pub use crate::reconcile::ReconcileConfig;
    pub use crate::reconcile::ReconcileReport;
    pub use crate::reconcile::Reconciler;
    pub use crate::reconcile::RunStatistics;
    pub use crate::store::KeyCorrection;
    pub use crate::store::MemoryRecordStore;
    pub use crate::store::RecordFilter;
    pub use crate::store::RecordStore;
    #[cfg(feature = "sqlite")]
    pub use crate::store::SqliteRecordStore;
    pub use crate::store::StoredRecord;
}
