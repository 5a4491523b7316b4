//! Reconciliation driver.
//!
//! Walks the records of a store one at a time, in store order. Record-level
//! failures are logged and skipped; a failure to apply a correction stops
//! the pass.

use serde::{Deserialize, Serialize};

use super::{reconcile_record, Decision, OutcomeKind, ReconcileReport, RecordOutcome};
use crate::error::{error_codes, KeyfixError, KeyfixResult};
use crate::store::{KeyCorrection, RecordFilter, RecordStore, StoredRecord};

/// Configuration for a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Write corrections to the store; otherwise only report them
    #[serde(default)]
    pub apply: bool,
    /// Which records to look at
    #[serde(default)]
    pub filter: RecordFilter,
}

impl ReconcileConfig {
    /// Dry run over every record with an unknown expiration
    pub fn dry_run() -> Self {
        Self {
            apply: false,
            filter: RecordFilter {
                only_unset_expiration: true,
                ..RecordFilter::default()
            },
        }
    }
}

/// Reconciles the records of one store
pub struct Reconciler<S: RecordStore> {
    store: S,
    config: ReconcileConfig,
}

impl<S: RecordStore> Reconciler<S> {
    /// Create a reconciler over `store`
    pub fn new(store: S, config: ReconcileConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Run one pass.
    ///
    /// Returns `Err` only when the store cannot hand out records. A failed
    /// correction is recorded in the report as `halted`; see
    /// [`ReconcileReport::into_result`].
    pub fn run(&mut self) -> KeyfixResult<ReconcileReport> {
        let mut report = ReconcileReport::begin(self.config.apply);

        let rows = self.store.fetch(&self.config.filter)?;
        log::info!(
            "Reconciling {} record(s) ({})",
            rows.len(),
            if self.config.apply { "apply" } else { "dry run" }
        );

        for row in rows {
            let record = match row {
                Ok(record) => record,
                Err(unreadable) => {
                    log::warn!(
                        "Member {}, Email {}, Key {} failed to read: {}",
                        unreadable.owner,
                        unreadable.address,
                        unreadable.stored_key_id,
                        unreadable.cause
                    );
                    report.push(RecordOutcome::for_unreadable(&unreadable));
                    continue;
                }
            };

            if !self.reconcile_one(&record, &mut report) {
                break;
            }
        }

        report.finish();
        log::info!(
            "Reconciliation finished: {} examined, {} unchanged, {} updated, {} pending, {} failed",
            report.statistics.examined,
            report.statistics.unchanged,
            report.statistics.updated,
            report.statistics.pending,
            report.statistics.failed
        );

        Ok(report)
    }

    // Returns false when the pass must stop.
    fn reconcile_one(&mut self, record: &StoredRecord, report: &mut ReconcileReport) -> bool {
        log::debug!(
            "member: {} <{}>, key: {}",
            record.owner,
            record.address,
            record.stored_key_id
        );

        let (key_id, expiration, key_id_match) = match reconcile_record(record) {
            Decision::NoChange => {
                report.push(RecordOutcome::for_record(record, OutcomeKind::Unchanged));
                return true;
            }
            Decision::Failed(reason) => {
                log::warn!(
                    "Member {}, Email {}, Key {} failed to get key info: {}",
                    record.owner,
                    record.address,
                    record.stored_key_id,
                    reason
                );
                report.push(RecordOutcome::for_record(record, OutcomeKind::Failed { reason }));
                return true;
            }
            Decision::Update {
                key_id,
                expiration,
                key_id_match,
            } => (key_id, expiration, key_id_match),
        };

        if key_id_match.is_discrepancy() {
            log::warn!(
                "Member {}, Email {}, Key {}, apparently now is key id {} / {} instead?",
                record.owner,
                record.address,
                record.stored_key_id,
                key_id,
                key_id.short_form()
            );
        }

        log::debug!("  Old expiry: {}", record.stored_expiration);
        log::debug!("  New expiry: {}", expiration);

        if !self.config.apply {
            report.push(
                RecordOutcome::for_record(record, OutcomeKind::Pending)
                    .with_update(&key_id, expiration, key_id_match),
            );
            return true;
        }

        let correction = KeyCorrection::for_record(record, key_id.clone(), expiration);
        match self.apply_correction(&correction) {
            Ok(()) => {
                log::debug!(
                    "  key id = {} => {} :: {}",
                    record.stored_key_id,
                    key_id,
                    expiration
                );
                report.push(
                    RecordOutcome::for_record(record, OutcomeKind::Updated)
                        .with_update(&key_id, expiration, key_id_match),
                );
                true
            }
            Err(err) => {
                log::error!(
                    "Member {}, Email {}, Key {}/{} failed to update expiry to {}: {}",
                    record.owner,
                    record.address,
                    record.stored_key_id,
                    key_id,
                    expiration,
                    err
                );
                let outcome = RecordOutcome::for_record(
                    record,
                    OutcomeKind::Halted {
                        error: err.to_string(),
                    },
                )
                .with_update(&key_id, expiration, key_id_match);
                report.halt(outcome, err);
                false
            }
        }
    }

    // Exactly one row must change; anything else means the record moved
    // under us or the store misbehaved.
    fn apply_correction(&mut self, correction: &KeyCorrection) -> KeyfixResult<()> {
        let changed = self.store.apply(correction).map_err(|err| {
            err.with_context("owner", &correction.owner)
                .with_context("address", &correction.address)
                .with_context("key_id", &correction.expected_key_id)
        })?;

        if changed != 1 {
            return Err(KeyfixError::record_persistence_failure(
                "update",
                &format!("expected 1 row, updated {}", changed),
                error_codes::STORE_ROW_COUNT_MISMATCH,
                &correction.owner,
                &correction.address,
                &correction.expected_key_id,
            ));
        }

        Ok(())
    }
}
