use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::ledger::LedgerError;
use crate::mailbox::MailboxError;

/// Failures that abort a whole cycle without advancing the checkpoint.
///
/// Per-message problems (fetch, decode, classify) are not errors at this
/// level; they are counted in the [`CycleReport`](super::CycleReport).
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Could not connect to the mailbox: {0}")]
    Connect(#[source] MailboxError),

    #[error("Could not list messages: {0}")]
    List(#[source] MailboxError),

    #[error("Store update failed: {0}")]
    Store(#[from] LedgerError),

    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),
}

impl CycleError {
    /// Whether the mailbox connection was established before the failure.
    pub fn connected(&self) -> bool {
        !matches!(self, CycleError::Connect(_))
    }
}
