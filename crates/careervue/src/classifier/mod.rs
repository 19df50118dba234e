//! Job-application classification of email content.
//!
//! The classification engine itself is external. This module defines the
//! contract ([`Classifier`]), the verdict type, strict parsing of the
//! service's flat JSON record, and an HTTP client for OpenAI-compatible
//! chat-completion endpoints.

pub mod chat;
pub mod verdict;

use async_trait::async_trait;
use thiserror::Error;

pub use chat::ChatCompletionClassifier;
pub use verdict::{parse_verdict, ApplicationStatus, ClassificationVerdict, JobDetails};

/// Errors from the classification service.
///
/// Any of these means "no verdict": the message is skipped and never
/// treated as unrelated to a job application.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Request(String),

    #[error("classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("classifier response is malformed: {0}")]
    Malformed(String),

    #[error("classifier credentials not available: {0}")]
    Credentials(#[from] crate::secrets::SecretError),
}

/// Extracts a [`ClassificationVerdict`] from one email.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        subject: &str,
        body: &str,
    ) -> Result<ClassificationVerdict, ClassifierError>;
}
