//! Content hash identifying a message across re-fetches.
//!
//! The UID is left out: servers renumber messages when UIDVALIDITY changes,
//! and the same message must still map to the same hash.

use super::decoder::MailMessage;

/// Hex-encoded blake3 hash of a message's stable content.
///
/// Covers the Message-ID, sender, timestamp, subject and a whitespace
/// normalized body. Each field is length-prefixed so that moving text
/// between fields changes the hash.
pub fn message_hash(message: &MailMessage) -> String {
    let mut hasher = blake3::Hasher::new();

    let timestamp = message.timestamp.timestamp().to_string();
    let body = normalize_body(&message.body);
    let fields: [&str; 5] = [
        message.message_id.as_deref().unwrap_or(""),
        &message.sender,
        &timestamp,
        message.subject.trim(),
        &body,
    ];

    for field in fields {
        hasher.update(&(field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }

    hasher.finalize().to_hex().to_string()
}

/// Unifies line endings and drops trailing whitespace, which some servers
/// rewrite between fetches.
fn normalize_body(body: &str) -> String {
    body.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
