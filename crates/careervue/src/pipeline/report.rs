use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CycleOutcome {
    /// All listed messages were handled and the checkpoint advanced.
    Completed,
    /// A stop request arrived between messages. The checkpoint is unchanged.
    Interrupted,
}

/// What happened to one listed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    FetchFailed,
    DecodeFailed,
    Duplicate,
    ClassifyFailed,
    NotJobRelated,
    Created { record_id: i64 },
    Updated { record_id: i64, status_changed: bool },
}

/// Summary of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// Lower bound used for the mailbox search.
    pub since: DateTime<Utc>,
    pub outcome: CycleOutcome,
    /// Whether the mailbox connect succeeded.
    pub connected: bool,
    /// Checkpoint written at the end of the cycle, if any.
    pub checkpoint: Option<DateTime<Utc>>,
    pub listed: usize,
    pub fetch_failed: usize,
    pub decode_failed: usize,
    pub duplicates: usize,
    pub classify_failed: usize,
    pub not_job_related: usize,
    pub created: usize,
    pub updated: usize,
    pub status_changes: usize,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Utc>, since: DateTime<Utc>) -> Self {
        Self {
            started_at,
            since,
            outcome: CycleOutcome::Completed,
            connected: false,
            checkpoint: None,
            listed: 0,
            fetch_failed: 0,
            decode_failed: 0,
            duplicates: 0,
            classify_failed: 0,
            not_job_related: 0,
            created: 0,
            updated: 0,
            status_changes: 0,
        }
    }

    pub fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::FetchFailed => self.fetch_failed += 1,
            MessageOutcome::DecodeFailed => self.decode_failed += 1,
            MessageOutcome::Duplicate => self.duplicates += 1,
            MessageOutcome::ClassifyFailed => self.classify_failed += 1,
            MessageOutcome::NotJobRelated => self.not_job_related += 1,
            MessageOutcome::Created { .. } => self.created += 1,
            MessageOutcome::Updated { status_changed, .. } => {
                self.updated += 1;
                if *status_changed {
                    self.status_changes += 1;
                }
            }
        }
    }

    /// Messages that were handled without a per-message failure.
    pub fn processed(&self) -> usize {
        self.duplicates + self.not_job_related + self.created + self.updated
    }

    /// Messages skipped because of a fetch, decode or classifier failure.
    pub fn skipped(&self) -> usize {
        self.fetch_failed + self.decode_failed + self.classify_failed
    }
}
