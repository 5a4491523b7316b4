//! In-memory record store.
//!
//! Holds records in a vector. Used by tests and by callers that load
//! records from elsewhere and only want the decisions.

use super::{FetchedRecord, KeyCorrection, RecordFilter, RecordStore, StoredRecord};
use crate::error::KeyfixResult;

/// Vector-backed `RecordStore`
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Vec<StoredRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<StoredRecord>) -> Self {
        Self { records }
    }

    pub fn insert(&mut self, record: StoredRecord) {
        self.records.push(record);
    }

    /// Current contents, in insertion order
    pub fn records(&self) -> &[StoredRecord] {
        &self.records
    }

    /// Look up a record by owner and address
    pub fn get(&self, owner: &str, address: &str) -> Option<&StoredRecord> {
        self.records
            .iter()
            .find(|r| r.owner == owner && r.address == address)
    }
}

impl RecordStore for MemoryRecordStore {
    fn fetch(&self, filter: &RecordFilter) -> KeyfixResult<Vec<FetchedRecord>> {
        let mut selected: Vec<&StoredRecord> =
            self.records.iter().filter(|r| filter.matches(r)).collect();

        selected.sort_by(|a, b| (&a.owner, &a.address).cmp(&(&b.owner, &b.address)));

        if let Some(limit) = filter.limit {
            selected.truncate(limit as usize);
        }

        Ok(selected.into_iter().cloned().map(Ok).collect())
    }

    fn apply(&mut self, correction: &KeyCorrection) -> KeyfixResult<usize> {
        let mut changed = 0;

        for record in self.records.iter_mut().filter(|r| {
            r.owner == correction.owner
                && r.address == correction.address
                && r.stored_key_id == correction.expected_key_id
        }) {
            record.stored_key_id = correction.key_id.to_string();
            record.stored_expiration = correction.expiration;
            changed += 1;
        }

        Ok(changed)
    }
}
