use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mailbox = &config.mailbox;

    if !mailbox.use_tls {
        return Err(invalid("mailbox.useTls must be true; plaintext IMAP is not supported"));
    }
    if mailbox.host.trim().is_empty() {
        return Err(invalid("mailbox.host must not be empty"));
    }
    if mailbox.username.trim().is_empty() {
        return Err(invalid("mailbox.username must not be empty"));
    }
    if mailbox.folder.trim().is_empty() {
        return Err(invalid("mailbox.folder must not be empty"));
    }
    if mailbox.connect_attempts == 0 {
        return Err(invalid("mailbox.connectAttempts must be at least 1"));
    }
    if mailbox.timeout_secs == 0 {
        return Err(invalid("mailbox.timeoutSecs must be greater than 0"));
    }

    let (what, secret) = mailbox.auth.required_secret();
    if !secret.is_configured() {
        return Err(ConfigError::Validation {
            message: format!("no source configured for the {}", what),
        });
    }

    let classifier = &config.classifier;
    if !classifier.endpoint.starts_with("http://") && !classifier.endpoint.starts_with("https://")
    {
        return Err(ConfigError::Validation {
            message: format!(
                "classifier.endpoint must be an http(s) URL, got '{}'",
                classifier.endpoint
            ),
        });
    }
    if classifier.model.trim().is_empty() {
        return Err(invalid("classifier.model must not be empty"));
    }
    if classifier.timeout_secs == 0 {
        return Err(invalid("classifier.timeoutSecs must be greater than 0"));
    }

    let poller = &config.poller;
    if poller.interval_secs == 0 || poller.recovery_interval_secs == 0 {
        return Err(invalid(
            "poller.intervalSecs and poller.recoveryIntervalSecs must be greater than 0",
        ));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}
