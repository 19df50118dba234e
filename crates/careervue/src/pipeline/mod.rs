//! One ingestion cycle: connect, list, then per message fetch, decode,
//! dedup check, classify and merge, and finally advance the checkpoint.

pub mod config;
pub mod error;
pub mod report;
pub mod runner;

pub use config::PipelineSettings;
pub use error::CycleError;
pub use report::{CycleOutcome, CycleReport, MessageOutcome};
pub use runner::IngestionPipeline;
