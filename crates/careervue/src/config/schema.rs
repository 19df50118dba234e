use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secrets::{expand_tilde, SecretSource};

/// Top-level configuration file (`careervue.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub mailbox: MailboxConfig,
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// IMAP mailbox settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxConfig {
    /// IMAP server hostname (e.g., "imap.gmail.com").
    pub host: String,

    /// IMAP server port (default: 993 for IMAPS).
    #[serde(default = "default_imap_port")]
    pub port: u16,

    /// Whether to use TLS. Plaintext connections are rejected at validation.
    #[serde(default = "default_true")]
    pub use_tls: bool,

    /// Login name, typically the email address.
    pub username: String,

    /// Authentication settings.
    #[serde(default)]
    pub auth: MailboxAuth,

    /// Folder to watch (default: "INBOX").
    #[serde(default = "default_inbox")]
    pub folder: String,

    /// Connection attempts per cycle before giving up (default: 3).
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Delay before the first reconnect, doubled on each further attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Per-operation network timeout in seconds (connect, search, fetch).
    #[serde(default = "default_operation_timeout")]
    pub timeout_secs: u64,
}

impl MailboxConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How to authenticate against the mailbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxAuthType {
    /// Plain LOGIN with a password (or app password).
    #[default]
    Password,
    /// SASL XOAUTH2 with a bearer access token.
    OAuth2,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxAuth {
    #[serde(default, rename = "type")]
    pub auth_type: MailboxAuthType,

    /// Password for `password` auth.
    #[serde(default)]
    pub password: SecretSource,

    /// Access token for `oauth2` auth.
    #[serde(default)]
    pub access_token: SecretSource,
}

impl MailboxAuth {
    /// The secret that the configured auth type needs.
    pub fn required_secret(&self) -> (&'static str, &SecretSource) {
        match self.auth_type {
            MailboxAuthType::Password => ("mailbox password", &self.password),
            MailboxAuthType::OAuth2 => ("mailbox OAuth2 access token", &self.access_token),
        }
    }
}

/// Classification service settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_classifier_model")]
    pub model: String,

    #[serde(default = "default_api_key_source")]
    pub api_key: SecretSource,

    /// Request timeout in seconds.
    #[serde(default = "default_operation_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of body characters sent for classification.
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_endpoint(),
            model: default_classifier_model(),
            api_key: default_api_key_source(),
            timeout_secs: default_operation_timeout(),
            max_body_chars: default_max_body_chars(),
        }
    }
}

/// Poll scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerConfig {
    /// Seconds between successful cycles (default: 300 = 5 minutes).
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Seconds to wait after a failed cycle (default: 60).
    #[serde(default = "default_recovery_interval")]
    pub recovery_interval_secs: u64,

    /// How long `stop` waits for the running cycle (default: 5).
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// First-run lookback when no checkpoint exists yet (default: 30 days).
    #[serde(default = "default_initial_lookback_days")]
    pub initial_lookback_days: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            recovery_interval_secs: default_recovery_interval(),
            stop_timeout_secs: default_stop_timeout(),
            initial_lookback_days: default_initial_lookback_days(),
        }
    }
}

/// On-disk locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// SQLite database path (default: `~/.careervue/data/careervue.db`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,

    /// Checkpoint file (default: `~/.careervue/data/last_checked.json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_path: Option<String>,
}

impl StorageConfig {
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(p) => Some(expand_tilde(p)),
            None => data_dir().map(|d| d.join("careervue.db")),
        }
    }

    pub fn checkpoint_path(&self) -> Option<PathBuf> {
        match &self.checkpoint_path {
            Some(p) => Some(expand_tilde(p)),
            None => data_dir().map(|d| d.join("last_checked.json")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::Pretty,
        }
    }
}

/// `~/.careervue`
pub fn app_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".careervue"))
}

/// `~/.careervue/data`
pub fn data_dir() -> Option<PathBuf> {
    app_dir().map(|d| d.join("data"))
}

/// `~/.careervue/careervue.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    app_dir().map(|d| d.join("careervue.yaml"))
}

fn default_imap_port() -> u16 {
    993
}

fn default_true() -> bool {
    true
}

fn default_inbox() -> String {
    "INBOX".to_string()
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_operation_timeout() -> u64 {
    60
}

fn default_classifier_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_classifier_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_source() -> SecretSource {
    SecretSource::env("OPENAI_API_KEY")
}

fn default_max_body_chars() -> usize {
    12_000
}

fn default_poll_interval() -> u64 {
    300 // 5 minutes
}

fn default_recovery_interval() -> u64 {
    60
}

fn default_stop_timeout() -> u64 {
    5
}

fn default_initial_lookback_days() -> u32 {
    30
}

fn default_log_filter() -> String {
    "info".to_string()
}
