//! Message and candidate types for SQL generation.

use serde::{Deserialize, Serialize};

/// Role of a chat message sent to a completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Returns the role as a string for API requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// What the generator produced for a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlCandidate {
    /// The generated SQL, or None when the question could not be translated.
    pub sql: Option<String>,
    /// Explanation or follow-up text for the user.
    pub explanation: String,
    /// Generator confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Below this confidence the user is told to review the SQL closely.
pub const LOW_CONFIDENCE: f32 = 0.5;

impl SqlCandidate {
    /// A candidate carrying SQL.
    pub fn sql(sql: impl Into<String>, explanation: impl Into<String>, confidence: f32) -> Self {
        Self {
            sql: Some(sql.into()),
            explanation: explanation.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A candidate with no SQL, only a reply for the user.
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            sql: None,
            explanation: text.into(),
            confidence: 0.0,
        }
    }

    pub fn is_low_confidence(&self) -> bool {
        self.sql.is_some() && self.confidence < LOW_CONFIDENCE
    }
}
