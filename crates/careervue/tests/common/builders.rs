//! Builders for raw messages and verdicts.

#![allow(dead_code)]

use careervue::{ApplicationStatus, ClassificationVerdict};

/// Body layout of a built message.
#[derive(Clone)]
enum Body {
    Plain(String),
    HtmlOnly(String),
    Alternative { text: String, html: String },
}

/// Builder for raw RFC 5322 message bytes, as an IMAP fetch returns them.
#[derive(Clone)]
pub struct RawMessageBuilder {
    subject: String,
    from: String,
    date: Option<String>,
    message_id: Option<String>,
    body: Body,
}

impl RawMessageBuilder {
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            from: "Acme Recruiting <jobs@acme.example>".to_string(),
            date: Some("Mon, 2 Feb 2026 09:00:00 +0000".to_string()),
            message_id: Some(format!("<{}@acme.example>", slug(subject))),
            body: Body::Plain("Hello,\r\n\r\nThanks for your interest.".to_string()),
        }
    }

    pub fn from(mut self, from: &str) -> Self {
        self.from = from.to_string();
        self
    }

    /// RFC 2822 date, e.g. `Wed, 4 Feb 2026 09:00:00 +0000`.
    pub fn date(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }

    pub fn without_date(mut self) -> Self {
        self.date = None;
        self
    }

    pub fn message_id(mut self, id: &str) -> Self {
        self.message_id = Some(format!("<{}>", id));
        self
    }

    pub fn text(mut self, body: &str) -> Self {
        self.body = Body::Plain(body.to_string());
        self
    }

    pub fn html_only(mut self, html: &str) -> Self {
        self.body = Body::HtmlOnly(html.to_string());
        self
    }

    pub fn alternative(mut self, text: &str, html: &str) -> Self {
        self.body = Body::Alternative {
            text: text.to_string(),
            html: html.to_string(),
        };
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!("From: {}\r\n", self.from));
        out.push_str("To: me@example.com\r\n");
        out.push_str(&format!("Subject: {}\r\n", self.subject));
        if let Some(date) = &self.date {
            out.push_str(&format!("Date: {}\r\n", date));
        }
        if let Some(id) = &self.message_id {
            out.push_str(&format!("Message-ID: {}\r\n", id));
        }
        out.push_str("MIME-Version: 1.0\r\n");

        match &self.body {
            Body::Plain(text) => {
                out.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
                out.push_str(text);
                out.push_str("\r\n");
            }
            Body::HtmlOnly(html) => {
                out.push_str("Content-Type: multipart/alternative; boundary=\"b1\"\r\n\r\n");
                out.push_str("--b1\r\nContent-Type: text/html; charset=utf-8\r\n\r\n");
                out.push_str(html);
                out.push_str("\r\n--b1--\r\n");
            }
            Body::Alternative { text, html } => {
                out.push_str("Content-Type: multipart/alternative; boundary=\"b1\"\r\n\r\n");
                out.push_str("--b1\r\nContent-Type: text/html; charset=utf-8\r\n\r\n");
                out.push_str(html);
                out.push_str("\r\n--b1\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n");
                out.push_str(text);
                out.push_str("\r\n--b1--\r\n");
            }
        }
        out.into_bytes()
    }
}

fn slug(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

/// A job-related verdict.
pub fn job(
    company: &str,
    position: &str,
    status: ApplicationStatus,
    note: &str,
) -> ClassificationVerdict {
    ClassificationVerdict::job_related(company, position, status, note)
}

pub fn acme(status: ApplicationStatus, note: &str) -> ClassificationVerdict {
    job("Acme", "Backend Engineer", status, note)
}
