//! Turns raw RFC 822 bytes into a normalized [`MailMessage`].

use chrono::{DateTime, Utc};
use log::debug;
use mail_parser::{HeaderName, Message, MessageParser, MessagePart, MimeHeaders, PartType};
use thiserror::Error;

use super::client::MessageUid;

/// A decoded message, ready for hashing and classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub uid: MessageUid,
    /// The `Message-ID` header, when present.
    pub message_id: Option<String>,
    /// Decoded subject; empty when absent or undecodable.
    pub subject: String,
    /// Bare sender address (no display name); empty when absent.
    pub sender: String,
    /// The `Date` header in UTC.
    pub timestamp: DateTime<Utc>,
    /// First `text/plain` part of a multipart message, or the whole payload.
    pub body: String,
}

/// Whole-message decoding failures. The message is skipped.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message UID {0} could not be parsed")]
    Unparseable(MessageUid),

    #[error("message UID {0} has no Date header")]
    MissingDate(MessageUid),

    #[error("message UID {0} has an unparseable Date header")]
    InvalidDate(MessageUid),
}

/// Stateless MIME decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageDecoder;

impl MessageDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, uid: MessageUid, raw: &[u8]) -> Result<MailMessage, DecodeError> {
        if raw.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(DecodeError::Unparseable(uid));
        }

        let message = MessageParser::default()
            .parse(raw)
            .ok_or(DecodeError::Unparseable(uid))?;

        let timestamp = parse_timestamp(uid, &message)?;

        let subject = message.subject().unwrap_or_default().to_string();
        let sender = message
            .from()
            .and_then(|addr| addr.first())
            .and_then(|addr| addr.address())
            .unwrap_or_default()
            .to_string();
        let message_id = message.message_id().map(|s| s.to_string());
        let body = extract_body(&message);

        debug!(
            "Decoded UID={} subject={:?} body_len={}",
            uid,
            subject,
            body.len()
        );

        Ok(MailMessage {
            uid,
            message_id,
            subject,
            sender,
            timestamp,
            body,
        })
    }
}

fn parse_timestamp(uid: MessageUid, message: &Message<'_>) -> Result<DateTime<Utc>, DecodeError> {
    let date = match message.date() {
        Some(date) if date.is_valid() => date,
        Some(_) => return Err(DecodeError::InvalidDate(uid)),
        None => {
            // A Date header that failed to parse is kept with an empty value.
            let present = message
                .headers()
                .iter()
                .any(|header| header.name == HeaderName::Date);
            return Err(if present {
                DecodeError::InvalidDate(uid)
            } else {
                DecodeError::MissingDate(uid)
            });
        }
    };

    DateTime::<Utc>::from_timestamp(date.to_timestamp(), 0).ok_or(DecodeError::InvalidDate(uid))
}

/// Picks the body text.
///
/// Multipart: the first part whose content type is exactly `text/plain`, or
/// an empty body when there is none. Single part: the whole payload.
fn extract_body(message: &Message<'_>) -> String {
    let Some(root) = message.parts.first() else {
        return String::new();
    };

    if !matches!(root.body, PartType::Multipart(_)) {
        return part_text(root);
    }

    message
        .parts
        .iter()
        .skip(1)
        .find(|part| is_text_plain(part))
        .map(part_text)
        .unwrap_or_default()
}

fn is_text_plain(part: &MessagePart<'_>) -> bool {
    match part.content_type() {
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct
                    .subtype()
                    .map(|s| s.eq_ignore_ascii_case("plain"))
                    .unwrap_or(false)
        }
        // MIME defaults a part without Content-Type to text/plain.
        None => matches!(part.body, PartType::Text(_)),
    }
}

fn part_text(part: &MessagePart<'_>) -> String {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(data) | PartType::InlineBinary(data) => {
            String::from_utf8_lossy(data).into_owned()
        }
        PartType::Message(_) | PartType::Multipart(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> Result<MailMessage, DecodeError> {
        MessageDecoder::new().decode(7, raw.as_bytes())
    }

    #[test]
    fn test_decode_simple_plain_message() {
        let raw = "From: Acme Recruiting <jobs@acme.example>\r\n\
                   To: me@example.com\r\n\
                   Subject: Your application to Acme\r\n\
                   Message-ID: <abc@acme.example>\r\n\
                   Date: Mon, 05 Jan 2026 10:30:00 +0100\r\n\
                   \r\n\
                   Thanks for applying to Backend Engineer.\r\n";
        let msg = decode(raw).unwrap();

        assert_eq!(msg.uid, 7);
        assert_eq!(msg.subject, "Your application to Acme");
        assert_eq!(msg.sender, "jobs@acme.example");
        assert_eq!(msg.message_id.as_deref(), Some("abc@acme.example"));
        assert_eq!(msg.timestamp.to_rfc3339(), "2026-01-05T09:30:00+00:00");
        assert!(msg.body.contains("Thanks for applying"));
    }

    #[test]
    fn test_multipart_takes_first_text_plain() {
        let raw = "From: jobs@acme.example\r\n\
                   Subject: Interview\r\n\
                   Date: Tue, 06 Jan 2026 08:00:00 +0000\r\n\
                   MIME-Version: 1.0\r\n\
                   Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
                   \r\n\
                   --b1\r\n\
                   Content-Type: text/html; charset=utf-8\r\n\
                   \r\n\
                   <p>HTML version</p>\r\n\
                   --b1\r\n\
                   Content-Type: text/plain; charset=utf-8\r\n\
                   \r\n\
                   Plain version\r\n\
                   --b1\r\n\
                   Content-Type: text/plain; charset=utf-8\r\n\
                   \r\n\
                   Second plain part\r\n\
                   --b1--\r\n";
        let msg = decode(raw).unwrap();
        assert_eq!(msg.body.trim(), "Plain version");
    }

    #[test]
    fn test_html_only_multipart_has_empty_body() {
        let raw = "From: jobs@acme.example\r\n\
                   Subject: Newsletter\r\n\
                   Date: Tue, 06 Jan 2026 08:00:00 +0000\r\n\
                   MIME-Version: 1.0\r\n\
                   Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
                   \r\n\
                   --b1\r\n\
                   Content-Type: text/html; charset=utf-8\r\n\
                   \r\n\
                   <p>Only HTML</p>\r\n\
                   --b1--\r\n";
        let msg = decode(raw).unwrap();
        assert_eq!(msg.body, "");
        assert_eq!(msg.subject, "Newsletter");
    }

    #[test]
    fn test_single_part_html_keeps_payload() {
        let raw = "From: jobs@acme.example\r\n\
                   Subject: Offer\r\n\
                   Date: Tue, 06 Jan 2026 08:00:00 +0000\r\n\
                   Content-Type: text/html; charset=utf-8\r\n\
                   \r\n\
                   <p>We are pleased</p>\r\n";
        let msg = decode(raw).unwrap();
        assert!(msg.body.contains("We are pleased"));
    }

    #[test]
    fn test_encoded_word_subject() {
        let raw = "From: jobs@acme.example\r\n\
                   Subject: =?UTF-8?B?QmV3ZXJidW5nIGVyaGFsdGVu?=\r\n\
                   Date: Tue, 06 Jan 2026 08:00:00 +0000\r\n\
                   \r\n\
                   body\r\n";
        let msg = decode(raw).unwrap();
        assert_eq!(msg.subject, "Bewerbung erhalten");
    }

    #[test]
    fn test_missing_subject_and_sender_degrade_to_empty() {
        let raw = "Date: Tue, 06 Jan 2026 08:00:00 +0000\r\n\
                   \r\n\
                   body\r\n";
        let msg = decode(raw).unwrap();
        assert_eq!(msg.subject, "");
        assert_eq!(msg.sender, "");
        assert!(msg.message_id.is_none());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut raw = b"From: jobs@acme.example\r\n\
                        Subject: Status\r\n\
                        Date: Tue, 06 Jan 2026 08:00:00 +0000\r\n\
                        Content-Type: text/plain; charset=utf-8\r\n\
                        \r\n\
                        caf"
        .to_vec();
        raw.extend_from_slice(&[0xff, 0xfe]);
        raw.extend_from_slice(b" ok\r\n");

        let msg = MessageDecoder::new().decode(1, &raw).unwrap();
        assert!(msg.body.starts_with("caf"));
        assert!(msg.body.contains("ok"));
    }

    #[test]
    fn test_missing_date_is_failure() {
        let raw = "From: jobs@acme.example\r\n\
                   Subject: No date\r\n\
                   \r\n\
                   body\r\n";
        assert_eq!(decode(raw).unwrap_err(), DecodeError::MissingDate(7));
    }

    #[test]
    fn test_garbage_date_is_failure() {
        let raw = "From: jobs@acme.example\r\n\
                   Subject: Bad date\r\n\
                   Date: sometime last week\r\n\
                   \r\n\
                   body\r\n";
        assert_eq!(decode(raw).unwrap_err(), DecodeError::InvalidDate(7));
    }

    #[test]
    fn test_empty_input_is_unparseable() {
        assert_eq!(
            MessageDecoder::new().decode(3, b"").unwrap_err(),
            DecodeError::Unparseable(3)
        );
        assert_eq!(
            MessageDecoder::new().decode(3, b"\r\n  \r\n").unwrap_err(),
            DecodeError::Unparseable(3)
        );
    }
}
