//! [`Classifier`] backed by an OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;

use super::verdict::parse_verdict;
use super::{ClassificationVerdict, Classifier, ClassifierError};

/// Longest error body kept in [`ClassifierError::Status`].
const MAX_ERROR_BODY_LENGTH: usize = 200;

const SYSTEM_PROMPT: &str = "You analyze emails and extract job application information. \
Respond with a single JSON object and nothing else, with the fields \
job_related (boolean), company_name, job_position, application_status and email_content. \
application_status is one of Applied, Interview, Offered, Rejected. \
When the email is not about the user's own job application, set job_related to false \
and every other field to null.";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessageResp,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionClassifier {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    max_body_chars: usize,
}

impl ChatCompletionClassifier {
    /// Builds the client and resolves the API key. A missing key is allowed
    /// for local endpoints that do not authenticate.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let api_key = config.api_key.resolve_optional("classifier API key")?;
        let client = Client::builder()
            .user_agent(concat!("careervue/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifierError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            max_body_chars: config.max_body_chars,
        })
    }

    fn user_prompt(&self, subject: &str, body: &str) -> String {
        let body = truncate_chars(body, self.max_body_chars);
        format!("Subject: {}\n\n{}", subject, body)
    }

    pub fn build_request(
        &self,
        subject: &str,
        body: &str,
    ) -> Result<reqwest::Request, ClassifierError> {
        let prompt = self.user_prompt(subject, body);
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.0,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        request
            .build()
            .map_err(|e| ClassifierError::Request(e.to_string()))
    }
}

#[async_trait]
impl Classifier for ChatCompletionClassifier {
    async fn classify(
        &self,
        subject: &str,
        body: &str,
    ) -> Result<ClassificationVerdict, ClassifierError> {
        let request = self.build_request(subject, body)?;

        let resp = self
            .client
            .execute(request)
            .await
            .map_err(|e| ClassifierError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_LENGTH).to_string(),
            });
        }

        let parsed: ChatApiResponse = resp
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassifierError::Malformed("response has no choices".to_string()))?;

        debug!("Classifier replied with {} chars", content.len());
        parse_verdict(&content)
    }
}

/// Cuts `text` to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
