use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::checkpoint::CheckpointStore;
use crate::classifier::{ClassificationVerdict, Classifier};
use crate::ledger::{ApplyOutcome, IngestionLedger};
use crate::mailbox::{
    connect_with_backoff, message_hash, MailboxClient, MessageDecoder, MessageUid,
};

use super::config::PipelineSettings;
use super::error::CycleError;
use super::report::{CycleOutcome, CycleReport, MessageOutcome};

/// Drives one mailbox through fetch, decode, classify and merge.
///
/// Only one cycle runs at a time: `run_cycle` takes `&mut self`, and the
/// poller owns the pipeline on its worker thread.
pub struct IngestionPipeline {
    mailbox: Box<dyn MailboxClient>,
    decoder: MessageDecoder,
    classifier: Arc<dyn Classifier>,
    ledger: IngestionLedger,
    checkpoint: Arc<dyn CheckpointStore>,
    settings: PipelineSettings,
}

impl IngestionPipeline {
    pub fn new(
        mailbox: Box<dyn MailboxClient>,
        classifier: Arc<dyn Classifier>,
        ledger: IngestionLedger,
        checkpoint: Arc<dyn CheckpointStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            mailbox,
            decoder: MessageDecoder::new(),
            classifier,
            ledger,
            checkpoint,
            settings,
        }
    }

    pub fn ledger(&self) -> &IngestionLedger {
        &self.ledger
    }

    pub fn checkpoint(&self) -> &Arc<dyn CheckpointStore> {
        &self.checkpoint
    }

    pub fn is_connected(&self) -> bool {
        self.mailbox.is_connected()
    }

    /// Runs a cycle that cannot be interrupted.
    pub async fn run_once(&mut self) -> Result<CycleReport, CycleError> {
        let (_stop_tx, stop_rx) = watch::channel(false);
        self.run_cycle(&stop_rx).await
    }

    /// Runs one cycle.
    ///
    /// The checkpoint is set to the time the cycle started, and only when
    /// every listed message was handled. Messages that failed to fetch,
    /// decode or classify are not recorded, so the next cycle (which lists
    /// from the new checkpoint's date) picks up those from the same day
    /// again. `stop` is checked between messages.
    pub async fn run_cycle(
        &mut self,
        stop: &watch::Receiver<bool>,
    ) -> Result<CycleReport, CycleError> {
        let started_at = Utc::now();
        let previous = self.checkpoint.load()?;
        let since = previous.unwrap_or(started_at - self.settings.initial_lookback);
        let mut report = CycleReport::new(started_at, since);

        let span = info_span!("cycle", id = %Uuid::new_v4(), since = %since.date_naive());
        async move {
            if *stop.borrow() {
                report.outcome = CycleOutcome::Interrupted;
                return Ok(report);
            }

            let attempts = connect_with_backoff(
                self.mailbox.as_mut(),
                self.settings.connect_attempts,
                self.settings.backoff_base,
            )
            .await
            .map_err(CycleError::Connect)?;
            debug!("Mailbox connected after {} attempt(s)", attempts);
            report.connected = true;

            let result = self.process_listed(since, stop, &mut report).await;
            self.mailbox.disconnect().await;
            result?;

            if report.outcome == CycleOutcome::Interrupted {
                info!(
                    "Cycle interrupted after {} of {} message(s); checkpoint unchanged",
                    report.processed() + report.skipped(),
                    report.listed
                );
                return Ok(report);
            }

            report.checkpoint = Some(self.advance_checkpoint(previous, started_at)?);
            info!(
                "Cycle complete: {} listed, {} created, {} updated, {} duplicate(s), {} unrelated, {} skipped",
                report.listed,
                report.created,
                report.updated,
                report.duplicates,
                report.not_job_related,
                report.skipped()
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn process_listed(
        &mut self,
        since: DateTime<Utc>,
        stop: &watch::Receiver<bool>,
        report: &mut CycleReport,
    ) -> Result<(), CycleError> {
        let uids = self
            .mailbox
            .list_since(since.date_naive())
            .await
            .map_err(CycleError::List)?;
        report.listed = uids.len();
        debug!("{} message(s) to examine", uids.len());

        for uid in uids {
            if *stop.borrow() {
                report.outcome = CycleOutcome::Interrupted;
                break;
            }
            let outcome = self
                .process_message(uid)
                .instrument(info_span!("message", uid))
                .await?;
            report.record(&outcome);
        }
        Ok(())
    }

    async fn process_message(&mut self, uid: MessageUid) -> Result<MessageOutcome, CycleError> {
        let raw = match self.mailbox.fetch(uid).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping message: fetch failed: {}", e);
                return Ok(MessageOutcome::FetchFailed);
            }
        };

        let message = match self.decoder.decode(uid, &raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Skipping message: {}", e);
                return Ok(MessageOutcome::DecodeFailed);
            }
        };

        let hash = message_hash(&message);
        if self.ledger.seen(&hash)? {
            debug!("Already processed");
            return Ok(MessageOutcome::Duplicate);
        }

        let verdict = match self
            .classifier
            .classify(&message.subject, &message.body)
            .await
        {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Skipping message '{}': {}", message.subject, e);
                return Ok(MessageOutcome::ClassifyFailed);
            }
        };

        let observed = message.timestamp.date_naive();
        let outcome = match self.ledger.apply_verdict(&hash, &verdict, observed)? {
            ApplyOutcome::Created { record_id } => {
                if let ClassificationVerdict::JobRelated(details) = &verdict {
                    info!(
                        "New application {}: {} / {} ({})",
                        record_id, details.company, details.position, details.status
                    );
                }
                MessageOutcome::Created { record_id }
            }
            ApplyOutcome::Updated {
                record_id,
                status_changed,
            } => {
                if status_changed {
                    if let ClassificationVerdict::JobRelated(details) = &verdict {
                        info!("Application {} is now {}", record_id, details.status);
                    }
                } else {
                    debug!("Application {} updated", record_id);
                }
                MessageOutcome::Updated {
                    record_id,
                    status_changed,
                }
            }
            ApplyOutcome::NotJobRelated => MessageOutcome::NotJobRelated,
            ApplyOutcome::AlreadyProcessed => MessageOutcome::Duplicate,
        };
        Ok(outcome)
    }

    /// Stores `started_at`, unless the stored value is later (clock skew).
    fn advance_checkpoint(
        &self,
        previous: Option<DateTime<Utc>>,
        started_at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, CycleError> {
        if let Some(previous) = previous {
            if previous > started_at {
                warn!(
                    "Stored checkpoint {} is ahead of the cycle start {}; keeping it",
                    previous.to_rfc3339(),
                    started_at.to_rfc3339()
                );
                return Ok(previous);
            }
        }
        self.checkpoint.save(started_at)?;
        Ok(started_at)
    }
}
