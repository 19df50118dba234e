//! Tracks which messages have already been ingested.

use chrono::Utc;
use log::debug;
use rusqlite::Connection;

use crate::db::{dedup_repo, Database};

use super::Result;

/// Message content hash to the record it produced.
///
/// A hash is recorded at most once. It only goes away when the record it
/// produced is deleted, which lets that message be ingested again.
#[derive(Clone)]
pub struct DedupCache {
    db: Database,
}

impl DedupCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn seen(&self, hash: &str) -> Result<bool> {
        Ok(self.db.with_conn(|conn| dedup_repo::exists(conn, hash))?)
    }

    /// Records a hash. `record_id` is `None` for messages that were not job
    /// related. Returns false if the hash was already known.
    pub fn record(&self, hash: &str, record_id: Option<i64>) -> Result<bool> {
        self.db
            .with_transaction(|tx| record_in(tx, hash, record_id))
    }

    /// Removes a hash. Returns false if it was not recorded.
    pub fn evict(&self, hash: &str) -> Result<bool> {
        self.db.with_transaction(|tx| evict_in(tx, hash))
    }

    /// The record a hash produced, if it produced one.
    pub fn record_for(&self, hash: &str) -> Result<Option<i64>> {
        let row = self.db.with_conn(|conn| dedup_repo::find(conn, hash))?;
        Ok(row.and_then(|r| r.record_id))
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.db.with_conn(dedup_repo::count)?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

pub(crate) fn seen_in(conn: &Connection, hash: &str) -> Result<bool> {
    Ok(dedup_repo::exists(conn, hash)?)
}

pub(crate) fn record_in(conn: &Connection, hash: &str, record_id: Option<i64>) -> Result<bool> {
    let inserted = dedup_repo::insert(conn, hash, record_id, &Utc::now().to_rfc3339())?;
    if inserted {
        debug!("Recorded message {} -> {:?}", short(hash), record_id);
    } else {
        debug!("Message {} was already recorded", short(hash));
    }
    Ok(inserted)
}

pub(crate) fn evict_in(conn: &Connection, hash: &str) -> Result<bool> {
    let removed = dedup_repo::delete(conn, hash)?;
    if removed {
        debug!("Evicted message {}", short(hash));
    }
    Ok(removed)
}

/// Leading characters of a hash, for log lines.
pub(crate) fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
