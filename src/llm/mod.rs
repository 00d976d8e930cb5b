//! Generator boundary.
//!
//! The [`SqlGenerator`] trait turns a question into a [`SqlCandidate`].
//! Implementations: a pattern-based mock and an OpenAI-compatible client.

pub mod mock;
pub mod openai;
pub mod parser;
pub mod prompt;
pub mod types;

pub use mock::MockGenerator;
pub use openai::{OpenAiConfig, OpenAiGenerator};
pub use parser::parse_completion;
pub use prompt::{build_messages, build_system_prompt};
pub use types::{Message, Role, SqlCandidate, LOW_CONFIDENCE};

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::db::Schema;
use crate::error::{GateError, Result};
use crate::session::ConversationMessage;

/// Translates natural-language questions into SQL.
///
/// Implementations must be thread-safe (Send + Sync) so one generator can
/// serve every session.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Generates SQL for `question` against `schema`, with prior turns as context.
    async fn generate(
        &self,
        question: &str,
        schema: &Schema,
        history: &[ConversationMessage],
    ) -> Result<SqlCandidate>;
}

/// Generator provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Mock generator (no API key required)
    #[default]
    Mock,
    /// OpenAI or a compatible server
    #[serde(alias = "open_ai")]
    OpenAi,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::OpenAi => "openai",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "openai" => Ok(Self::OpenAi),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Creates the generator selected by configuration.
///
/// `api_key` is required for OpenAI and ignored for the mock.
pub fn build_generator(config: &LlmConfig, api_key: Option<String>) -> Result<Arc<dyn SqlGenerator>> {
    match config.provider {
        LlmProvider::Mock => Ok(Arc::new(MockGenerator::new())),
        LlmProvider::OpenAi => {
            let api_key = api_key
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| GateError::config("OPENAI_API_KEY is not set"))?;
            let mut openai = OpenAiConfig::new(api_key, config.model.clone())
                .with_timeout(config.timeout_secs);
            if let Some(base_url) = &config.base_url {
                openai = openai.with_base_url(base_url.clone());
            }
            Ok(Arc::new(OpenAiGenerator::new(openai)?))
        }
    }
}
