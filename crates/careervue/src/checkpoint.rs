//! The sync checkpoint: when the last successful cycle started.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to read checkpoint '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write checkpoint '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Checkpoint lock poisoned")]
    LockPoisoned,
}

/// Persists a single last-checked timestamp.
pub trait CheckpointStore: Send + Sync {
    /// The stored timestamp, or `None` if nothing usable is stored.
    fn load(&self) -> Result<Option<DateTime<Utc>>, CheckpointError>;

    fn save(&self, at: DateTime<Utc>) -> Result<(), CheckpointError>;
}

#[derive(Serialize, Deserialize)]
struct CheckpointFile {
    last_checked: String,
}

/// JSON file checkpoint: `{"last_checked": "<timestamp>"}`.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a crash never leaves a half-written checkpoint.
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "last_checked.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_err(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl CheckpointStore for FileCheckpoint {
    fn load(&self) -> Result<Option<DateTime<Utc>>, CheckpointError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CheckpointError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        // An unreadable checkpoint falls back to the initial lookback rather
        // than blocking every future cycle.
        let file: CheckpointFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    "Ignoring malformed checkpoint {}: {}",
                    self.path.display(),
                    e
                );
                return Ok(None);
            }
        };

        match parse_timestamp(&file.last_checked) {
            Some(at) => Ok(Some(at)),
            None => {
                warn!(
                    "Ignoring checkpoint {} with unparseable timestamp '{}'",
                    self.path.display(),
                    file.last_checked
                );
                Ok(None)
            }
        }
    }

    fn save(&self, at: DateTime<Utc>) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;
            }
        }

        let json = serde_json::to_string(&CheckpointFile {
            last_checked: at.to_rfc3339(),
        })?;

        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp).map_err(|e| self.write_err(e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| self.write_err(e))?;
            file.sync_all().map_err(|e| self.write_err(e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.write_err(e))?;

        debug!("Checkpoint saved: {}", at.to_rfc3339());
        Ok(())
    }
}

/// Accepts RFC 3339, or a naive ISO timestamp taken as UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Process-local checkpoint, for embedding and tests.
#[derive(Default)]
pub struct MemoryCheckpoint {
    value: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryCheckpoint {
    pub fn new(initial: Option<DateTime<Utc>>) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn load(&self) -> Result<Option<DateTime<Utc>>, CheckpointError> {
        Ok(*self.value.lock().map_err(|_| CheckpointError::LockPoisoned)?)
    }

    fn save(&self, at: DateTime<Utc>) -> Result<(), CheckpointError> {
        *self.value.lock().map_err(|_| CheckpointError::LockPoisoned)? = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = FileCheckpoint::new(dir.path().join("last_checked.json"));
        assert!(checkpoint.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("last_checked.json");
        let checkpoint = FileCheckpoint::new(&path);
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();

        checkpoint.save(at).unwrap();
        assert_eq!(checkpoint.load().unwrap(), Some(at));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["last_checked"], "2026-01-05T10:00:00+00:00");
        assert!(!checkpoint.temp_path().exists());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = FileCheckpoint::new(dir.path().join("last_checked.json"));
        let first = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 1, 6, 10, 0, 0).unwrap();
        checkpoint.save(first).unwrap();
        checkpoint.save(second).unwrap();
        assert_eq!(checkpoint.load().unwrap(), Some(second));
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_checked.json");
        fs::write(&path, r#"{"last_checked": "2026-01-05T10:00:00.123456"}"#).unwrap();

        let loaded = FileCheckpoint::new(&path).load().unwrap().unwrap();
        assert_eq!(
            loaded.timestamp(),
            Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn test_malformed_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_checked.json");

        fs::write(&path, "not json").unwrap();
        assert!(FileCheckpoint::new(&path).load().unwrap().is_none());

        fs::write(&path, r#"{"last_checked": "yesterday"}"#).unwrap();
        assert!(FileCheckpoint::new(&path).load().unwrap().is_none());
    }

    #[test]
    fn test_memory_checkpoint() {
        let checkpoint = MemoryCheckpoint::default();
        assert!(checkpoint.load().unwrap().is_none());
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        checkpoint.save(at).unwrap();
        assert_eq!(checkpoint.load().unwrap(), Some(at));
    }
}
