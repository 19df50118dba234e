//! Processed message repository: operations on the `processed_messages` table.

use rusqlite::{params, Connection, OptionalExtension};

use super::DatabaseError;

/// A raw processed message row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedMessageRow {
    pub hash: String,
    /// Job the message produced, `None` when it was not job related.
    pub record_id: Option<i64>,
    pub processed_at: String,
}

/// Records a hash. Returns false if the hash was already present, in which
/// case the existing row is left untouched.
pub fn insert(
    conn: &Connection,
    hash: &str,
    record_id: Option<i64>,
    processed_at: &str,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO processed_messages (hash, record_id, processed_at)
         VALUES (?1, ?2, ?3)",
        params![hash, record_id, processed_at],
    )?;
    Ok(inserted > 0)
}

/// Returns true if the hash has been recorded.
pub fn exists(conn: &Connection, hash: &str) -> Result<bool, DatabaseError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM processed_messages WHERE hash = ?1",
            params![hash],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Finds the row for a hash.
pub fn find(conn: &Connection, hash: &str) -> Result<Option<ProcessedMessageRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT hash, record_id, processed_at FROM processed_messages WHERE hash = ?1",
            params![hash],
            |row| {
                Ok(ProcessedMessageRow {
                    hash: row.get(0)?,
                    record_id: row.get(1)?,
                    processed_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Removes a hash. Returns false if it was not present.
pub fn delete(conn: &Connection, hash: &str) -> Result<bool, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM processed_messages WHERE hash = ?1",
        params![hash],
    )?;
    Ok(removed > 0)
}

/// Counts recorded hashes.
pub fn count(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row("SELECT COUNT(*) FROM processed_messages", [], |r| r.get(0))?;
    Ok(count)
}
