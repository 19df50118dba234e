//! Job repository: row-level operations on the `jobs` table.
//!
//! Functions take a `&Connection` so they compose inside
//! [`Database::with_transaction`](super::Database::with_transaction).

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw job application row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub id: i64,
    pub company: String,
    pub position: String,
    pub status: String,
    pub application_date: String,
    pub last_updated: String,
    pub notes: String,
    pub source_message_hash: Option<String>,
    pub has_update: bool,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            company: row.get("company")?,
            position: row.get("position")?,
            status: row.get("status")?,
            application_date: row.get("application_date")?,
            last_updated: row.get("last_updated")?,
            notes: row.get("notes")?,
            source_message_hash: row.get("source_message_hash")?,
            has_update: row.get("has_update")?,
        })
    }
}

/// Column values for a row that has no id yet.
#[derive(Debug, Clone)]
pub struct NewJobRow<'a> {
    pub company: &'a str,
    pub position: &'a str,
    pub status: &'a str,
    pub application_date: &'a str,
    pub last_updated: &'a str,
    pub notes: &'a str,
    pub source_message_hash: Option<&'a str>,
    pub has_update: bool,
}

const COLUMNS: &str = "id, company, position, status, application_date, last_updated, notes, \
                       source_message_hash, has_update";

/// Inserts a new row and returns its id.
pub fn insert(conn: &Connection, job: &NewJobRow<'_>) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (company, position, status, application_date, last_updated, notes,
         source_message_hash, has_update)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            job.company,
            job.position,
            job.status,
            job.application_date,
            job.last_updated,
            job.notes,
            job.source_message_hash,
            job.has_update,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrites every column except `id`. Returns false if no row matched.
pub fn update(conn: &Connection, job: &JobRow) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET company = ?2, position = ?3, status = ?4, application_date = ?5,
         last_updated = ?6, notes = ?7, source_message_hash = ?8, has_update = ?9
         WHERE id = ?1",
        params![
            job.id,
            job.company,
            job.position,
            job.status,
            job.application_date,
            job.last_updated,
            job.notes,
            job.source_message_hash,
            job.has_update,
        ],
    )?;
    Ok(changed > 0)
}

/// Finds a row by id.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?1", COLUMNS),
            params![id],
            JobRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Finds the row for a (company, position) key.
///
/// If earlier edits left several rows with the same key, the oldest wins so
/// merges keep landing on the same record.
pub fn find_by_key(
    conn: &Connection,
    company: &str,
    position: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM jobs WHERE company = ?1 AND position = ?2 ORDER BY id ASC LIMIT 1",
                COLUMNS
            ),
            params![company, position],
            JobRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Lists all rows, most recently updated first.
pub fn list(conn: &Connection) -> Result<Vec<JobRow>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM jobs ORDER BY last_updated DESC, id DESC",
        COLUMNS
    ))?;
    let rows = stmt
        .query_map([], JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Deletes a row. Returns false if no row matched.
pub fn delete(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

/// Clears the `has_update` marker. Returns false if no row matched.
pub fn clear_update_flag(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET has_update = 0 WHERE id = ?1",
        params![id],
    )?;
    Ok(changed > 0)
}

/// Counts all rows.
pub fn count(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
    Ok(count)
}
