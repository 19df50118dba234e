use std::time::Duration;

use crate::config::Config;

/// Cycle tuning taken from the mailbox and poller config sections.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub connect_attempts: u32,
    pub backoff_base: Duration,
    /// How far back the first cycle looks when no checkpoint exists.
    pub initial_lookback: chrono::Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect_attempts: config.mailbox.connect_attempts,
            backoff_base: config.mailbox.backoff_base(),
            initial_lookback: chrono::Duration::days(i64::from(
                config.poller.initial_lookback_days,
            )),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            backoff_base: Duration::from_secs(1),
            initial_lookback: chrono::Duration::days(30),
        }
    }
}
