//! Reconciliation reports.
//!
//! Per-record outcomes and run statistics for one pass.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FailureReason;
use crate::error::{KeyfixError, KeyfixResult};
use crate::keyring::{Expiration, KeyId, KeyIdMatch};
use crate::store::{StoredRecord, UnreadableRecord};

/// What happened to one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Already correct
    Unchanged,
    /// Correction applied
    Updated,
    /// Correction computed but not applied (dry run)
    Pending,
    /// Key-ring gave no usable answer
    Failed { reason: FailureReason },
    /// The store could not decode the row
    Unreadable { cause: String },
    /// Applying the correction failed; the pass stopped here
    Halted { error: String },
}

/// Outcome of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub owner: String,
    pub address: String,
    pub stored_key_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_expiration: Option<Expiration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<KeyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<Expiration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id_match: Option<KeyIdMatch>,
    #[serde(flatten)]
    pub kind: OutcomeKind,
}

impl RecordOutcome {
    pub fn for_record(record: &StoredRecord, kind: OutcomeKind) -> Self {
        Self {
            owner: record.owner.clone(),
            address: record.address.clone(),
            stored_key_id: record.stored_key_id.clone(),
            old_expiration: Some(record.stored_expiration),
            key_id: None,
            expiration: None,
            key_id_match: None,
            kind,
        }
    }

    pub fn for_unreadable(row: &UnreadableRecord) -> Self {
        Self {
            owner: row.owner.clone(),
            address: row.address.clone(),
            stored_key_id: row.stored_key_id.clone(),
            old_expiration: None,
            key_id: None,
            expiration: None,
            key_id_match: None,
            kind: OutcomeKind::Unreadable {
                cause: row.cause.clone(),
            },
        }
    }

    /// Attach the derived values of an update
    pub fn with_update(mut self, key_id: &KeyId, expiration: Expiration, key_id_match: KeyIdMatch) -> Self {
        self.key_id = Some(key_id.clone());
        self.expiration = Some(expiration);
        self.key_id_match = Some(key_id_match);
        self
    }
}

/// Statistics for a reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Records handed out by the store
    #[serde(default)]
    pub examined: u32,
    #[serde(default)]
    pub unchanged: u32,
    #[serde(default)]
    pub updated: u32,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub unreadable: u32,
    /// Stored key ids naming a different key than the key-ring
    #[serde(default)]
    pub key_id_discrepancies: u32,
    /// Failures broken down by reason
    #[serde(default)]
    pub failures_by_reason: BTreeMap<String, u32>,
}

impl RunStatistics {
    fn count(&mut self, outcome: &RecordOutcome) {
        self.examined += 1;

        if outcome.key_id_match.map_or(false, |m| m.is_discrepancy()) {
            self.key_id_discrepancies += 1;
        }

        match &outcome.kind {
            OutcomeKind::Unchanged => self.unchanged += 1,
            OutcomeKind::Updated => self.updated += 1,
            OutcomeKind::Pending => self.pending += 1,
            OutcomeKind::Failed { reason } => {
                self.failed += 1;
                *self
                    .failures_by_reason
                    .entry(reason.label().to_string())
                    .or_insert(0) += 1;
            }
            OutcomeKind::Unreadable { .. } => self.unreadable += 1,
            OutcomeKind::Halted { .. } => {}
        }
    }

    /// Number of failures with the given label
    pub fn failure_count(&self, label: &str) -> u32 {
        self.failures_by_reason.get(label).copied().unwrap_or(0)
    }
}

/// The record whose correction stopped a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaltInfo {
    pub owner: String,
    pub address: String,
    pub stored_key_id: String,
    pub error: String,
    pub error_code: u32,
}

/// Report of one reconciliation pass
#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub run_id: Uuid,
    /// Whether corrections were applied or only computed
    pub apply: bool,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub statistics: RunStatistics,
    pub outcomes: Vec<RecordOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<HaltInfo>,
    #[serde(skip)]
    halt_error: Option<KeyfixError>,
}

impl ReconcileReport {
    pub fn begin(apply: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            apply,
            started_at: Utc::now(),
            completed_at: None,
            statistics: RunStatistics::default(),
            outcomes: Vec::new(),
            halted: None,
            halt_error: None,
        }
    }

    pub fn push(&mut self, outcome: RecordOutcome) {
        self.statistics.count(&outcome);
        self.outcomes.push(outcome);
    }

    /// Record the persistence failure that stopped the run
    pub fn halt(&mut self, outcome: RecordOutcome, error: KeyfixError) {
        self.halted = Some(HaltInfo {
            owner: outcome.owner.clone(),
            address: outcome.address.clone(),
            stored_key_id: outcome.stored_key_id.clone(),
            error: error.to_string(),
            error_code: error.error_code(),
        });
        self.push(outcome);
        self.halt_error = Some(error);
    }

    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Outcomes of one status, in processing order
    pub fn outcomes_where<'a>(
        &'a self,
        pred: impl Fn(&OutcomeKind) -> bool + 'a,
    ) -> impl Iterator<Item = &'a RecordOutcome> + 'a {
        self.outcomes.iter().filter(move |o| pred(&o.kind))
    }

    /// The report, or the persistence error that halted the run
    pub fn into_result(mut self) -> KeyfixResult<Self> {
        match self.halt_error.take() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}
