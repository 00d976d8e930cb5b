//! OpenAI-compatible SQL generator.
//!
//! Sends the prompt to a chat-completions endpoint (OpenAI or any server
//! speaking the same API) and parses the reply into a [`SqlCandidate`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::db::Schema;
use crate::error::{GateError, Result};
use crate::llm::parser::parse_completion;
use crate::llm::prompt::build_messages;
use crate::llm::types::Message;
use crate::llm::{SqlCandidate, SqlGenerator};
use crate::session::ConversationMessage;

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Maximum number of retry attempts for transient errors.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Model to use (e.g., "gpt-4o-mini").
    pub model: String,
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Generator backed by a chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GateError::generation(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (GateError, bool) {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return (
                GateError::generation("Authentication failed. Check your OPENAI_API_KEY."),
                false,
            );
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return (
                GateError::generation("Rate limited. Please wait and try again."),
                true,
            );
        }

        let is_retryable = status.is_server_error();

        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return (
                GateError::generation(format!("API error: {}", error_response.error.message)),
                is_retryable,
            );
        }

        (
            GateError::generation(format!("API error ({}): {}", status, body)),
            is_retryable,
        )
    }

    fn request_error(error: &reqwest::Error) -> (GateError, bool) {
        if error.is_timeout() {
            (GateError::generation("Request timed out. Try again."), true)
        } else if error.is_connect() {
            (
                GateError::generation("Failed to connect to the completion API. Check your network."),
                true,
            )
        } else {
            (GateError::generation(format!("Request failed: {}", error)), false)
        }
    }

    /// Sends one completion request, retrying transient failures with
    /// exponential backoff.
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(messages),
        };
        let url = self.config.completions_url();

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!(attempt, max = MAX_RETRY_ATTEMPTS, "Completion request");

            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&request)
                .send()
                .await;

            let (error, is_retryable) = match result {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.map_err(|e| {
                        GateError::generation(format!("Failed to read response: {}", e))
                    })?;

                    if status.is_success() {
                        let response: OpenAiResponse = serde_json::from_str(&body).map_err(|e| {
                            GateError::generation(format!("Failed to parse response: {}", e))
                        })?;
                        return response
                            .choices
                            .into_iter()
                            .next()
                            .map(|c| c.message.content)
                            .ok_or_else(|| GateError::generation("Empty completion"));
                    }
                    Self::parse_error(status, &body)
                }
                Err(e) => Self::request_error(&e),
            };

            if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
                return Err(error);
            }
            warn!(attempt, ?delay, error = %error, "Completion request failed, retrying");
            last_error = Some(error);

            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        Err(last_error.unwrap_or_else(|| GateError::generation("No completion attempt was made")))
    }
}

#[async_trait]
impl SqlGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        question: &str,
        schema: &Schema,
        history: &[ConversationMessage],
    ) -> Result<SqlCandidate> {
        let messages = build_messages(question, schema, history);
        let completion = self.complete(&messages).await?;
        Ok(parse_completion(&completion))
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}
