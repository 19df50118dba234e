//! Shared test utilities for careervue integration tests.
//!
//! This module provides:
//! - `TestHarness`: a pipeline wired to a scripted mailbox, a scripted
//!   classifier, an in-memory checkpoint and an in-memory database
//! - Builders for raw RFC 5322 messages and classifier verdicts

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
