//! Mailbox access: IMAP session handling, message decoding and hashing.
//!
//! The pipeline only talks to [`MailboxClient`], so tests can script a
//! mailbox without a server.

pub mod client;
pub mod decoder;
pub mod error;
pub mod hash;

pub use client::{connect_with_backoff, imap_since_date, ImapClient, MailboxClient, MessageUid};
pub use decoder::{DecodeError, MailMessage, MessageDecoder};
pub use error::MailboxError;
pub use hash::message_hash;
