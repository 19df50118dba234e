//! Verdict types and response parsing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ClassifierError;

/// Application status as reported by the classifier.
///
/// Unknown values are carried through verbatim; the store never rejects a
/// status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApplicationStatus {
    Applied,
    Interview,
    Offer,
    Rejected,
    Other(String),
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Interview => "Interview",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Other(s) => s,
        }
    }

    /// Maps a stored or reported value. "Offered" is the classifier's
    /// spelling of [`ApplicationStatus::Offer`].
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "applied" => ApplicationStatus::Applied,
            "interview" => ApplicationStatus::Interview,
            "offer" | "offered" => ApplicationStatus::Offer,
            "rejected" => ApplicationStatus::Rejected,
            _ => ApplicationStatus::Other(trimmed.to_string()),
        }
    }
}

impl From<String> for ApplicationStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ApplicationStatus> for String {
    fn from(value: ApplicationStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the classifier extracted from a job-related email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDetails {
    /// Non-empty, trimmed.
    pub company: String,
    /// Non-empty, trimmed.
    pub position: String,
    pub status: ApplicationStatus,
    /// Summary of the email; may be empty.
    pub note: String,
}

/// Structured result of classifying one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationVerdict {
    NotJobRelated,
    JobRelated(JobDetails),
}

impl ClassificationVerdict {
    pub fn job_related(
        company: impl Into<String>,
        position: impl Into<String>,
        status: ApplicationStatus,
        note: impl Into<String>,
    ) -> Self {
        ClassificationVerdict::JobRelated(JobDetails {
            company: company.into(),
            position: position.into(),
            status,
            note: note.into(),
        })
    }

    pub fn is_job_related(&self) -> bool {
        matches!(self, ClassificationVerdict::JobRelated(_))
    }
}

/// Wire shape of the classifier's flat record.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    job_related: Option<bool>,
    company_name: Option<String>,
    job_position: Option<String>,
    application_status: Option<String>,
    email_content: Option<String>,
}

/// Keys every reply must carry, null or not.
const RECORD_KEYS: [&str; 4] = [
    "company_name",
    "job_position",
    "application_status",
    "email_content",
];

/// Parses the classifier's reply into a verdict.
///
/// The reply must be a single JSON object, optionally wrapped in a markdown
/// code fence, carrying all four record keys. `job_related` may be omitted,
/// in which case a record with every key null means "not job related". A
/// job-related record needs a non-empty company, position and status.
/// Anything else is [`ClassifierError::Malformed`].
pub fn parse_verdict(reply: &str) -> Result<ClassificationVerdict, ClassifierError> {
    let json = strip_code_fence(reply);

    let value: Value = serde_json::from_str(json)
        .map_err(|e| ClassifierError::Malformed(format!("not valid JSON: {}", e)))?;
    let Some(object) = value.as_object() else {
        return Err(ClassifierError::Malformed(
            "expected a JSON object".to_string(),
        ));
    };

    let missing: Vec<&str> = RECORD_KEYS
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(ClassifierError::Malformed(format!(
            "record is missing {}",
            missing.join(", ")
        )));
    }

    let raw: RawVerdict = serde_json::from_value(value)
        .map_err(|e| ClassifierError::Malformed(format!("unexpected field types: {}", e)))?;

    let company = non_empty(raw.company_name);
    let position = non_empty(raw.job_position);
    let status = non_empty(raw.application_status);

    let job_related = match raw.job_related {
        Some(flag) => flag,
        None => company.is_some() || position.is_some() || status.is_some(),
    };

    if !job_related {
        return Ok(ClassificationVerdict::NotJobRelated);
    }

    match (company, position, status) {
        (Some(company), Some(position), Some(status)) => {
            Ok(ClassificationVerdict::JobRelated(JobDetails {
                company,
                position,
                status: ApplicationStatus::parse(&status),
                note: raw.email_content.unwrap_or_default().trim().to_string(),
            }))
        }
        (company, position, status) => {
            let mut missing = Vec::new();
            if company.is_none() {
                missing.push("company_name");
            }
            if position.is_none() {
                missing.push("job_position");
            }
            if status.is_none() {
                missing.push("application_status");
            }
            Err(ClassifierError::Malformed(format!(
                "job-related record is missing {}",
                missing.join(", ")
            )))
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Removes a surrounding ```json ... ``` fence, if any.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. "json") on the opening line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
