pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod mailbox;
pub mod pipeline;
pub mod poller;
pub mod secrets;

pub use checkpoint::{CheckpointError, CheckpointStore, FileCheckpoint, MemoryCheckpoint};
pub use classifier::{
    ApplicationStatus, ChatCompletionClassifier, ClassificationVerdict, Classifier,
    ClassifierError, JobDetails,
};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{CareervueError, ConfigError, Result};
pub use ledger::{
    ApplyOutcome, DedupCache, IngestionLedger, JobApplication, JobField, LedgerError,
    ReconciliationStore,
};
pub use mailbox::{ImapClient, MailMessage, MailboxClient, MailboxError, MessageDecoder};
pub use pipeline::{CycleError, CycleOutcome, CycleReport, IngestionPipeline, PipelineSettings};
pub use poller::{Poller, PollerError, PollerSettings, PollerState, PollerStatus};
pub use secrets::{SecretError, SecretSource};
