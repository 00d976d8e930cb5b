//! Mock SQL generator for testing.
//!
//! Provides deterministic completions based on question patterns, run
//! through the same completion parser as real providers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::parser::parse_completion;
use super::{SqlCandidate, SqlGenerator};
use crate::db::Schema;
use crate::error::{GateError, Result};
use crate::session::ConversationMessage;

/// A generation request as the mock saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub question: String,
    pub history_len: usize,
}

/// Mock generator that returns canned completions based on input patterns.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    /// Custom completions (pattern -> completion), checked in order.
    custom_responses: Vec<(String, String)>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom completion.
    ///
    /// When the question contains `pattern` (case-insensitive), the mock
    /// answers with `completion`.
    pub fn with_response(mut self, pattern: impl Into<String>, completion: impl Into<String>) -> Self {
        self.custom_responses.push((pattern.into(), completion.into()));
        self
    }

    /// Shorthand for a completion that is exactly one SQL block.
    pub fn with_sql(self, pattern: impl Into<String>, sql: &str) -> Self {
        self.with_response(pattern, format!("```sql\n{sql}\n```"))
    }

    /// Makes every call fail with a generation error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Makes every call take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn mock_completion(&self, question: &str) -> String {
        let question_lower = question.to_lowercase();

        for (pattern, completion) in &self.custom_responses {
            if question_lower.contains(&pattern.to_lowercase()) {
                return completion.clone();
            }
        }

        if question_lower.contains("all users") || question_lower.contains("show users") {
            return "```sql\nSELECT * FROM users;\n```\nConfidence: 0.95".to_string();
        }

        if question_lower.contains("count") && question_lower.contains("orders") {
            return "```sql\nSELECT COUNT(*) FROM orders;\n```\nConfidence: 0.9".to_string();
        }

        if (question_lower.contains("insert") || question_lower.contains("add"))
            && question_lower.contains("user")
        {
            return "```sql\nINSERT INTO users (email, name) VALUES ('test@example.com', 'Test User');\n```".to_string();
        }

        if question_lower.contains("update") && question_lower.contains("user") {
            return "```sql\nUPDATE users SET name = 'Updated Name' WHERE id = 1;\n```".to_string();
        }

        if question_lower.contains("delete") && question_lower.contains("user") {
            return "```sql\nDELETE FROM users WHERE id = 1;\n```".to_string();
        }

        "I don't understand that question. Could you please rephrase it?".to_string()
    }
}

#[async_trait]
impl SqlGenerator for MockGenerator {
    async fn generate(
        &self,
        question: &str,
        _schema: &Schema,
        history: &[ConversationMessage],
    ) -> Result<SqlCandidate> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                question: question.to_string(),
                history_len: history.len(),
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(GateError::generation(message.clone()));
        }

        Ok(parse_completion(&self.mock_completion(question)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ask(generator: &MockGenerator, question: &str) -> SqlCandidate {
        generator
            .generate(question, &Schema::new(), &[])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_default_patterns() {
        let generator = MockGenerator::new();
        let candidate = ask(&generator, "Show me all users").await;
        assert_eq!(candidate.sql.as_deref(), Some("SELECT * FROM users;"));

        let candidate = ask(&generator, "delete user 1").await;
        assert_eq!(candidate.sql.as_deref(), Some("DELETE FROM users WHERE id = 1;"));
    }

    #[tokio::test]
    async fn test_unknown_question_is_reply() {
        let candidate = ask(&MockGenerator::new(), "what's the weather?").await;
        assert_eq!(candidate.sql, None);
        assert!(candidate.explanation.contains("rephrase"));
    }

    #[tokio::test]
    async fn test_custom_response_first() {
        let generator = MockGenerator::new().with_sql("users", "SELECT * FROM user-accounts");
        let candidate = ask(&generator, "show all users").await;
        assert_eq!(candidate.sql.as_deref(), Some("SELECT * FROM user-accounts"));
    }

    #[tokio::test]
    async fn test_failing_and_recorded() {
        let generator = MockGenerator::new().failing("API timeout");
        let history = vec![ConversationMessage::assistant("Hello")];
        let err = generator
            .generate("anything", &Schema::new(), &history)
            .await
            .unwrap_err();
        assert_eq!(err, GateError::generation("API timeout"));
        assert_eq!(
            generator.calls(),
            vec![RecordedCall {
                question: "anything".to_string(),
                history_len: 1
            }]
        );
    }
}
