//! Configuration management for querygate.
//!
//! Loads the generator, risk policy, session settings and data sources
//! from a TOML file. A missing file yields the defaults.

use crate::db::{ForeignKey, Schema, Table};
use crate::error::{GateError, Result};
use crate::llm::openai::DEFAULT_TIMEOUT_SECS;
use crate::llm::LlmProvider;
use crate::safety::RiskPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default confirmation timeout in seconds.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 600;

/// Default number of history messages passed to the generator.
pub const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 20;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    /// Risk tiers for the configurable mutating kinds.
    #[serde(default)]
    pub policy: RiskPolicy,

    #[serde(default)]
    pub session: SessionConfig,

    /// Data sources by id.
    #[serde(default)]
    pub data_sources: BTreeMap<String, DataSourceConfig>,
}

/// Generator configuration. The API key is read from `OPENAI_API_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    #[serde(default = "default_model")]
    pub model: String,

    /// API root for OpenAI-compatible servers.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// First assistant message of every fresh conversation.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Seconds a confirmation request stays open; 0 waits forever.
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    /// History messages passed to the generator per turn.
    #[serde(default = "default_max_context")]
    pub max_context_messages: usize,
}

fn default_greeting() -> String {
    "Hello! Ask me anything about your data and I'll write the SQL.".to_string()
}

fn default_confirmation_timeout() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}

fn default_max_context() -> usize {
    DEFAULT_MAX_CONTEXT_MESSAGES
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            max_context_messages: default_max_context(),
        }
    }
}

impl SessionConfig {
    /// The confirmation timeout, or None if requests never expire.
    pub fn confirmation_timeout(&self) -> Option<Duration> {
        (self.confirmation_timeout_secs > 0)
            .then(|| Duration::from_secs(self.confirmation_timeout_secs))
    }
}

/// One data source: how to reach it and what it contains.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DataSourceConfig {
    /// Connection URL (`postgres://…`, `mysql://…`); its scheme names the dialect.
    #[serde(default)]
    pub url: Option<String>,

    /// Database type tag, used when no URL is given.
    #[serde(default)]
    pub database_type: Option<String>,

    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl DataSourceConfig {
    /// The connection descriptor handed to dialect resolution.
    pub fn descriptor(&self) -> Result<&str> {
        self.url
            .as_deref()
            .or(self.database_type.as_deref())
            .ok_or_else(|| GateError::config("Data source needs a `url` or a `database_type`"))
    }

    pub fn schema(&self) -> Schema {
        Schema {
            tables: self.tables.clone(),
            foreign_keys: self.foreign_keys.clone(),
        }
    }

    /// Returns a display-safe descriptor (no password).
    pub fn display_string(&self) -> String {
        match (&self.url, &self.database_type) {
            (Some(url), _) => match Url::parse(url) {
                Ok(mut parsed) => {
                    if parsed.password().is_some() {
                        let _ = parsed.set_password(Some("***"));
                    }
                    parsed.to_string()
                }
                Err(_) => "<invalid url>".to_string(),
            },
            (None, Some(tag)) => tag.clone(),
            (None, None) => "<unconfigured>".to_string(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("querygate")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| GateError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses and validates configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            GateError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every data source has a connection descriptor.
    pub fn validate(&self) -> Result<()> {
        for (id, source) in &self.data_sources {
            source
                .descriptor()
                .map_err(|e| GateError::config(format!("data source '{id}': {e}")))?;
        }
        Ok(())
    }

    pub fn data_source(&self, id: &str) -> Option<&DataSourceConfig> {
        self.data_sources.get(id)
    }

    /// The id of the first data source in name order.
    pub fn default_data_source(&self) -> Option<&str> {
        self.data_sources.keys().next().map(String::as_str)
    }
}
