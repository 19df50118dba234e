//! Secret resolution for mailbox credentials and the classifier API key.
//!
//! A [`SecretSource`] names up to three places a secret may live. They are
//! consulted in priority order:
//!
//! 1. **Inline value** (`value`) - quick local setups, logged as insecure
//! 2. **File** (`file`) - Docker/Kubernetes secret mounts
//! 3. **Environment variable** (`envVar`) - the usual production choice

use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source configured for {what} (need one of: value, file, envVar)")]
    NoSourceProvided { what: &'static str },

    #[error("Failed to read {what} from file '{path}': {source}")]
    FileReadError {
        what: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' for {what} is not set")]
    EnvVarNotSet { what: &'static str, name: String },

    #[error("Environment variable '{name}' for {what} contains invalid UTF-8")]
    EnvVarNotUnicode { what: &'static str, name: String },
}

/// Result type for secret resolution.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Where to find one secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    /// Inline secret value. Convenient, but ends up in the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Path to a file whose (trimmed) contents are the secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Name of an environment variable holding the secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

impl SecretSource {
    /// Source that reads only from the given environment variable.
    pub fn env(name: impl Into<String>) -> Self {
        Self {
            env_var: Some(name.into()),
            ..Self::default()
        }
    }

    /// Source holding an inline value.
    pub fn inline(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// True when at least one non-empty source is set.
    pub fn is_configured(&self) -> bool {
        non_empty(&self.value).is_some()
            || non_empty(&self.file).is_some()
            || non_empty(&self.env_var).is_some()
    }

    /// Resolves the secret. `what` names the secret in error messages.
    pub fn resolve(&self, what: &'static str) -> Result<SecretString> {
        if let Some(value) = non_empty(&self.value) {
            log::warn!(
                "Using an inline value for {}. Prefer `file` or `envVar` outside local testing.",
                what
            );
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = non_empty(&self.file) {
            let expanded = expand_tilde(path);
            return match fs::read_to_string(&expanded) {
                Ok(content) => Ok(SecretString::from(content.trim().to_string())),
                Err(e) => Err(SecretError::FileReadError {
                    what,
                    path: expanded.display().to_string(),
                    source: e,
                }),
            };
        }

        if let Some(name) = non_empty(&self.env_var) {
            return match std::env::var(name) {
                // Env vars often carry a trailing newline when set from files.
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    what,
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    what,
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided { what })
    }

    /// Like [`resolve`](Self::resolve) but maps "nothing configured" to `None`.
    pub fn resolve_optional(&self, what: &'static str) -> Result<Option<SecretString>> {
        match self.resolve(what) {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Expands a leading `~` to the user's home directory.
///
/// Only `~` and `~/...` are supported; `~user/...` is returned unchanged.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            if path == "~" {
                return home;
            }
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}
