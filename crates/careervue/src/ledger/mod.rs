//! The ingestion ledger: job records plus the processed-message cache.
//!
//! Both live in the same database so that applying a verdict (merge the
//! record, remember the message) and deleting a record (drop the row, forget
//! the message that produced it) are each a single transaction.

pub mod dedup;
pub mod store;

use chrono::NaiveDate;
use log::info;
use thiserror::Error;

use crate::classifier::ClassificationVerdict;
use crate::db::{job_repo, Database, DatabaseError};

pub use dedup::DedupCache;
pub use store::{
    JobApplication, JobField, MergeKind, Reconciled, ReconciliationStore, DATE_FORMAT,
    NOTES_SEPARATOR,
};

/// Errors from ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Job record {0} not found")]
    RecordNotFound(i64),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Job record {id} is corrupt: {reason}")]
    CorruptRecord { id: i64, reason: String },
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// What applying a verdict did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created { record_id: i64 },
    Updated { record_id: i64, status_changed: bool },
    NotJobRelated,
    /// The hash was recorded by an earlier call; nothing changed.
    AlreadyProcessed,
}

/// Store and cache behind one interface.
#[derive(Clone)]
pub struct IngestionLedger {
    db: Database,
    store: ReconciliationStore,
    cache: DedupCache,
}

impl IngestionLedger {
    pub fn new(db: Database) -> Self {
        Self {
            store: ReconciliationStore::new(db.clone()),
            cache: DedupCache::new(db.clone()),
            db,
        }
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    pub fn seen(&self, hash: &str) -> Result<bool> {
        self.cache.seen(hash)
    }

    /// Applies a verdict for the message with `hash`, observed on `observed`.
    ///
    /// Job-related verdicts are merged by natural key and the record's
    /// `source_message_hash` is pointed at this message. Unrelated verdicts
    /// only record the hash. Either way the record and the cache entry are
    /// written in one transaction, so a failure leaves neither behind.
    pub fn apply_verdict(
        &self,
        hash: &str,
        verdict: &ClassificationVerdict,
        observed: NaiveDate,
    ) -> Result<ApplyOutcome> {
        self.db.with_transaction(|tx| {
            if dedup::seen_in(tx, hash)? {
                return Ok(ApplyOutcome::AlreadyProcessed);
            }

            match verdict {
                ClassificationVerdict::NotJobRelated => {
                    dedup::record_in(tx, hash, None)?;
                    Ok(ApplyOutcome::NotJobRelated)
                }
                ClassificationVerdict::JobRelated(details) => {
                    let reconciled = store::reconcile_in(tx, details, observed, Some(hash))?;
                    let record_id = reconciled.record().id;
                    dedup::record_in(tx, hash, Some(record_id))?;
                    Ok(match reconciled {
                        Reconciled::Created(_) => ApplyOutcome::Created { record_id },
                        Reconciled::Merged(_, kind) => ApplyOutcome::Updated {
                            record_id,
                            status_changed: kind == MergeKind::StatusChanged,
                        },
                    })
                }
            }
        })
    }

    /// Deletes a record and evicts the hash of the message that last wrote
    /// it, so that message is ingested again on the next cycle.
    ///
    /// Returns false if the record does not exist.
    pub fn delete_record(&self, id: i64) -> Result<bool> {
        self.db.with_transaction(|tx| {
            let Some(row) = job_repo::find_by_id(tx, id)? else {
                return Ok(false);
            };

            job_repo::delete(tx, id)?;
            if let Some(hash) = row.source_message_hash.as_deref() {
                dedup::evict_in(tx, hash)?;
            }

            info!(
                "Deleted record {} ({} / {})",
                id, row.company, row.position
            );
            Ok(true)
        })
    }
}
