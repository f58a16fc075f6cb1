//! OpenAI-compatible chat completions client.

use super::{extract_json, CompletionClient, CompletionConfig};
use crate::errors::{CompletionError, ConfigError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

const MAX_ERROR_BODY: usize = 512;

/// Chat message in a completion request.
#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Completion client that talks to an OpenAI-compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    config: CompletionConfig,
}

impl HttpCompletionClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured or the HTTP client
    /// cannot be built.
    pub fn new(config: CompletionConfig) -> Result<Self, ConfigError> {
        config.require_api_key()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::invalid("http_client", e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Creates a client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment is incomplete.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(CompletionConfig::from_env()?)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }
}

/// Message `name` fields only accept `[A-Za-z0-9_-]`.
fn sanitize_name(role: &str) -> Option<String> {
    let name: String = role
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .take(64)
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

fn map_transport(err: &reqwest::Error) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::transport(err.to_string())
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        role: &str,
        system_prompt: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, CompletionError> {
        let api_key = self
            .config
            .require_api_key()
            .map_err(|e| CompletionError::Unavailable(e.to_string()))?;
        let user_content = serde_json::to_string(payload)
            .map_err(|e| CompletionError::transport(format!("payload is not serializable: {e}")))?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                    name: sanitize_name(role),
                },
                ChatMessage {
                    role: "user",
                    content: &user_content,
                    name: None,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: self.config.temperature,
        };

        let started = Instant::now();
        let response = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| map_transport(&e))?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        if !status.is_success() {
            warn!(role = %role, status = status.as_u16(), latency_ms, "Completion request rejected");
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| CompletionError::parse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)?;

        debug!(role = %role, model = %self.config.model, latency_ms, "Completion received");
        extract_json(&content)
    }
}
