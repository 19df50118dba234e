//! Job application records and the status-aware merge.

use chrono::{NaiveDate, Utc};
use log::{debug, info};
use rusqlite::Connection;
use serde::Serialize;

use crate::classifier::{ApplicationStatus, JobDetails};
use crate::db::job_repo::{self, JobRow, NewJobRow};
use crate::db::Database;

use super::{LedgerError, Result};

/// Separator placed between accumulated notes.
pub const NOTES_SEPARATOR: &str = "\n\n";

/// Storage format for `application_date` and `last_updated`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A job application record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub id: i64,
    pub company: String,
    pub position: String,
    pub status: ApplicationStatus,
    /// Date first observed; never changed by merges.
    pub application_date: NaiveDate,
    pub last_updated: NaiveDate,
    pub notes: String,
    pub source_message_hash: Option<String>,
    /// Set when a merge changed the status, cleared by the consumer.
    pub has_update: bool,
}

impl JobApplication {
    fn from_row(row: JobRow) -> Result<Self> {
        let application_date =
            parse_stored_date(row.id, "application_date", &row.application_date)?;
        let last_updated = parse_stored_date(row.id, "last_updated", &row.last_updated)?;
        Ok(Self {
            id: row.id,
            status: ApplicationStatus::parse(&row.status),
            company: row.company,
            position: row.position,
            application_date,
            last_updated,
            notes: row.notes,
            source_message_hash: row.source_message_hash,
            has_update: row.has_update,
        })
    }

    fn to_row(&self) -> JobRow {
        JobRow {
            id: self.id,
            company: self.company.clone(),
            position: self.position.clone(),
            status: self.status.as_str().to_string(),
            application_date: format_date(self.application_date),
            last_updated: format_date(self.last_updated),
            notes: self.notes.clone(),
            source_message_hash: self.source_message_hash.clone(),
            has_update: self.has_update,
        }
    }
}

/// A user edit to one field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobField {
    Company(String),
    Position(String),
    Status(ApplicationStatus),
    ApplicationDate(NaiveDate),
    /// Replaces the whole notes text.
    Notes(String),
}

impl JobField {
    /// Builds an [`JobField::ApplicationDate`] edit from `YYYY-MM-DD` text.
    pub fn application_date(value: &str) -> Result<Self> {
        NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
            .map(JobField::ApplicationDate)
            .map_err(|_| LedgerError::InvalidField {
                field: "application_date",
                reason: format!("'{}' is not a YYYY-MM-DD date", value),
            })
    }

    fn name(&self) -> &'static str {
        match self {
            JobField::Company(_) => "company",
            JobField::Position(_) => "position",
            JobField::Status(_) => "status",
            JobField::ApplicationDate(_) => "application_date",
            JobField::Notes(_) => "notes",
        }
    }
}

/// What a merge did to an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    StatusChanged,
    StatusUnchanged,
}

/// Outcome of reconciling one set of job details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Created(JobApplication),
    Merged(JobApplication, MergeKind),
}

impl Reconciled {
    pub fn record(&self) -> &JobApplication {
        match self {
            Reconciled::Created(record) | Reconciled::Merged(record, _) => record,
        }
    }
}

/// Durable table of job applications keyed by (company, position).
#[derive(Clone)]
pub struct ReconciliationStore {
    db: Database,
}

impl ReconciliationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn find_by_key(&self, company: &str, position: &str) -> Result<Option<JobApplication>> {
        self.db
            .with_conn(|conn| job_repo::find_by_key(conn, company.trim(), position.trim()))?
            .map(JobApplication::from_row)
            .transpose()
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<JobApplication>> {
        self.db
            .with_conn(|conn| job_repo::find_by_id(conn, id))?
            .map(JobApplication::from_row)
            .transpose()
    }

    /// Creates a record from job details first observed on `observed`.
    pub fn insert(&self, details: &JobDetails, observed: NaiveDate) -> Result<JobApplication> {
        self.db
            .with_transaction(|tx| insert_in(tx, details, observed, None))
    }

    /// Merges job details into an existing record.
    pub fn merge_update(
        &self,
        record: &JobApplication,
        details: &JobDetails,
        observed: NaiveDate,
    ) -> Result<(JobApplication, MergeKind)> {
        self.db
            .with_transaction(|tx| merge_in(tx, record, details, observed, None))
    }

    /// Looks up the key and inserts or merges, in one transaction.
    pub fn reconcile(&self, details: &JobDetails, observed: NaiveDate) -> Result<Reconciled> {
        self.db
            .with_transaction(|tx| reconcile_in(tx, details, observed, None))
    }

    /// Applies a validated user edit.
    ///
    /// Status edits move `last_updated` to today. Other edits leave it alone.
    pub fn update_field(&self, id: i64, field: JobField) -> Result<JobApplication> {
        let today = Utc::now().date_naive();
        self.db.with_transaction(|tx| {
            let mut record = job_repo::find_by_id(tx, id)?
                .map(JobApplication::from_row)
                .transpose()?
                .ok_or(LedgerError::RecordNotFound(id))?;

            let name = field.name();
            match field {
                JobField::Company(value) => record.company = required_text(name, &value)?,
                JobField::Position(value) => record.position = required_text(name, &value)?,
                JobField::Status(status) => {
                    if status.as_str().trim().is_empty() {
                        return Err(LedgerError::InvalidField {
                            field: name,
                            reason: "must not be empty".to_string(),
                        });
                    }
                    record.status = status;
                    record.last_updated = today;
                }
                JobField::ApplicationDate(date) => record.application_date = date,
                JobField::Notes(value) => record.notes = value,
            }

            job_repo::update(tx, &record.to_row())?;
            debug!("Record {} field '{}' updated", id, name);
            Ok(record)
        })
    }

    /// All records, most recently updated first.
    pub fn list(&self) -> Result<Vec<JobApplication>> {
        self.db
            .with_conn(job_repo::list)?
            .into_iter()
            .map(JobApplication::from_row)
            .collect()
    }

    /// Clears `has_update` once a consumer has shown the change.
    pub fn clear_update_flag(&self, id: i64) -> Result<bool> {
        Ok(self.db.with_conn(|conn| job_repo::clear_update_flag(conn, id))?)
    }

    pub fn count(&self) -> Result<u64> {
        Ok(self.db.with_conn(job_repo::count)?)
    }
}

/// Inserts a new record inside an open transaction.
pub(crate) fn insert_in(
    conn: &Connection,
    details: &JobDetails,
    observed: NaiveDate,
    source_hash: Option<&str>,
) -> Result<JobApplication> {
    let company = details.company.trim();
    let position = details.position.trim();
    let date = format_date(observed);
    let id = job_repo::insert(
        conn,
        &NewJobRow {
            company,
            position,
            status: details.status.as_str(),
            application_date: &date,
            last_updated: &date,
            notes: details.note.trim(),
            source_message_hash: source_hash,
            has_update: true,
        },
    )?;

    info!(
        "Created record {} for {} / {} ({})",
        id, company, position, details.status
    );

    Ok(JobApplication {
        id,
        company: company.to_string(),
        position: position.to_string(),
        status: details.status.clone(),
        application_date: observed,
        last_updated: observed,
        notes: details.note.trim().to_string(),
        source_message_hash: source_hash.map(str::to_string),
        has_update: true,
    })
}

/// Merges details into `record` inside an open transaction.
///
/// A status change replaces the status and marks the record updated. Either
/// way `last_updated` becomes `observed` and the note is appended.
pub(crate) fn merge_in(
    conn: &Connection,
    record: &JobApplication,
    details: &JobDetails,
    observed: NaiveDate,
    source_hash: Option<&str>,
) -> Result<(JobApplication, MergeKind)> {
    let mut merged = record.clone();

    let kind = if merged.status != details.status {
        merged.status = details.status.clone();
        merged.has_update = true;
        MergeKind::StatusChanged
    } else {
        MergeKind::StatusUnchanged
    };

    merged.last_updated = observed;
    merged.notes = append_note(&merged.notes, &details.note);
    if let Some(hash) = source_hash {
        merged.source_message_hash = Some(hash.to_string());
    }

    if !job_repo::update(conn, &merged.to_row())? {
        return Err(LedgerError::RecordNotFound(record.id));
    }

    match kind {
        MergeKind::StatusChanged => info!(
            "Record {} status {} -> {}",
            record.id, record.status, merged.status
        ),
        MergeKind::StatusUnchanged => debug!(
            "Record {} merged without status change ({})",
            record.id, merged.status
        ),
    }

    Ok((merged, kind))
}

/// Point lookup by natural key, then insert or merge.
pub(crate) fn reconcile_in(
    conn: &Connection,
    details: &JobDetails,
    observed: NaiveDate,
    source_hash: Option<&str>,
) -> Result<Reconciled> {
    let existing = job_repo::find_by_key(conn, details.company.trim(), details.position.trim())?
        .map(JobApplication::from_row)
        .transpose()?;

    match existing {
        Some(record) => {
            let (merged, kind) = merge_in(conn, &record, details, observed, source_hash)?;
            Ok(Reconciled::Merged(merged, kind))
        }
        None => Ok(Reconciled::Created(insert_in(
            conn,
            details,
            observed,
            source_hash,
        )?)),
    }
}

/// Appends `note` to `notes`. Empty notes add nothing.
fn append_note(notes: &str, note: &str) -> String {
    let note = note.trim();
    if note.is_empty() {
        notes.to_string()
    } else if notes.is_empty() {
        note.to_string()
    } else {
        format!("{}{}{}", notes, NOTES_SEPARATOR, note)
    }
}

fn required_text(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidField {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_stored_date(id: i64, column: &'static str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| LedgerError::CorruptRecord {
        id,
        reason: format!("{} '{}' is not a YYYY-MM-DD date", column, value),
    })
}
