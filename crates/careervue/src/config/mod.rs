pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    default_config_path, ClassifierConfig, Config, LogFormat, LoggingConfig, MailboxAuth,
    MailboxAuthType, MailboxConfig, PollerConfig, StorageConfig,
};
