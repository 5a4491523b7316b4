/*!
 * Record stores
 *
 * The persistence boundary of the reconciler: a `RecordStore` hands out
 * stored (owner, address, key id, expiration, key-ring) records in owner
 * then address order and applies narrowly-scoped conditional corrections.
 */

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryRecordStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRecordStore;

use serde::{Deserialize, Serialize};

use crate::error::KeyfixResult;
use crate::keyring::{Expiration, KeyId};

/// One persisted key record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Owner of the record (a member name)
    pub owner: String,
    /// Address the key is registered for
    pub address: String,
    /// Key id as stored: short, long, or historically truncated
    pub stored_key_id: String,
    /// Expiration as stored
    pub stored_expiration: Expiration,
    /// Serialized key-ring
    pub keyring: Vec<u8>,
}

impl StoredRecord {
    pub fn new(
        owner: impl Into<String>,
        address: impl Into<String>,
        stored_key_id: impl Into<String>,
        stored_expiration: Expiration,
        keyring: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            owner: owner.into(),
            address: address.into(),
            stored_key_id: stored_key_id.into(),
            stored_expiration,
            keyring: keyring.into(),
        }
    }
}

/// A row the store could not decode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadableRecord {
    pub owner: String,
    pub address: String,
    pub stored_key_id: String,
    pub cause: String,
}

/// A fetched row: a record, or the reason it could not be read
pub type FetchedRecord = Result<StoredRecord, UnreadableRecord>;

/// Conditional correction of one record.
///
/// Applies only where owner, address and the key id as originally read
/// still match, guarding against concurrent modification of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCorrection {
    pub owner: String,
    pub address: String,
    /// Key id as read from the store
    pub expected_key_id: String,
    /// Key id to write
    pub key_id: KeyId,
    /// Expiration to write
    pub expiration: Expiration,
}

impl KeyCorrection {
    pub fn for_record(record: &StoredRecord, key_id: KeyId, expiration: Expiration) -> Self {
        Self {
            owner: record.owner.clone(),
            address: record.address.clone(),
            expected_key_id: record.stored_key_id.clone(),
            key_id,
            expiration,
        }
    }
}

/// Which records a pass looks at.
///
/// Records with an empty key-ring are never returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Only records whose stored expiration is unknown (epoch zero)
    #[serde(default)]
    pub only_unset_expiration: bool,
    /// Only records of this owner
    #[serde(default)]
    pub owner: Option<String>,
    /// At most this many records
    #[serde(default)]
    pub limit: Option<u32>,
}

impl RecordFilter {
    /// Whether a record passes the non-limit parts of the filter
    pub fn matches(&self, record: &StoredRecord) -> bool {
        if record.keyring.is_empty() {
            return false;
        }
        if self.only_unset_expiration && record.stored_expiration.is_known() {
            return false;
        }
        match &self.owner {
            Some(owner) => record.owner == *owner,
            None => true,
        }
    }
}

/// Persistence used by the reconciler
pub trait RecordStore {
    /// Records passing `filter`, ordered by owner then address
    fn fetch(&self, filter: &RecordFilter) -> KeyfixResult<Vec<FetchedRecord>>;

    /// Apply a correction, returning the number of rows changed
    fn apply(&mut self, correction: &KeyCorrection) -> KeyfixResult<usize>;
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn fetch(&self, filter: &RecordFilter) -> KeyfixResult<Vec<FetchedRecord>> {
        (**self).fetch(filter)
    }

    fn apply(&mut self, correction: &KeyCorrection) -> KeyfixResult<usize> {
        (**self).apply(correction)
    }
}
