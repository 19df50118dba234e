use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CareervueError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] crate::mailbox::MailboxError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] crate::classifier::ClassifierError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] crate::checkpoint::CheckpointError),

    #[error("Cycle error: {0}")]
    Cycle(#[from] crate::pipeline::CycleError),

    #[error("Poller error: {0}")]
    Poller(#[from] crate::poller::PollerError),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("No config path given and no home directory to derive a default from")]
    NoDefaultPath,
}

pub type Result<T> = std::result::Result<T, CareervueError>;
