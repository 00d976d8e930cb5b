//! Conversation history entries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::QueryResult;
use crate::gate::RequestId;
use crate::safety::{OperationKind, RiskTier};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Coarse message category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    SqlQuery,
    QueryResult,
    ConfirmationPrompt,
}

/// What a message carries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePayload {
    /// Free text: the user's question, a greeting or a follow-up reply.
    Text { text: String },
    /// An intermediate step announcement.
    Step { step: String },
    /// A turn-ending error.
    Error { kind: String, message: String },
    /// The statement after sanitization.
    Sql { text: String, was_modified: bool },
    /// Rows returned by the executor.
    Result { result: QueryResult },
    /// A mutating statement awaiting a decision.
    Confirmation {
        request_id: RequestId,
        statement: String,
        operation_kind: OperationKind,
        risk_tier: RiskTier,
    },
}

/// One entry in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub role: Role,
    pub payload: MessagePayload,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(role: Role, payload: MessagePayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, MessagePayload::Text { text: text.into() })
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessagePayload::Text { text: text.into() })
    }

    pub fn step(step: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessagePayload::Step { step: step.into() })
    }

    pub fn kind(&self) -> MessageKind {
        match self.payload {
            MessagePayload::Text { .. } | MessagePayload::Step { .. } | MessagePayload::Error { .. } => {
                MessageKind::Text
            }
            MessagePayload::Sql { .. } => MessageKind::SqlQuery,
            MessagePayload::Result { .. } => MessageKind::QueryResult,
            MessagePayload::Confirmation { .. } => MessageKind::ConfirmationPrompt,
        }
    }

    /// Text of this message as context for the generator.
    ///
    /// Step announcements and confirmation prompts carry nothing the
    /// generator needs and yield None.
    pub fn prompt_text(&self) -> Option<String> {
        match &self.payload {
            MessagePayload::Text { text } => Some(text.clone()),
            MessagePayload::Sql { text, .. } => Some(format!("```sql\n{text}\n```")),
            MessagePayload::Result { result } => Some(match result.rows_affected {
                Some(n) => format!("The query changed {n} row(s)."),
                None => format!("The query returned {} row(s).", result.row_count()),
            }),
            MessagePayload::Error { message, .. } => Some(format!("The query failed: {message}")),
            MessagePayload::Step { .. } | MessagePayload::Confirmation { .. } => None,
        }
    }

    /// One-line rendering for transcripts.
    pub fn summary(&self) -> String {
        let who = match self.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let body = match &self.payload {
            MessagePayload::Text { text } => text.clone(),
            MessagePayload::Step { step } => format!("[step] {step}"),
            MessagePayload::Error { kind, message } => format!("[error:{kind}] {message}"),
            MessagePayload::Sql { text, was_modified } => {
                let note = if *was_modified { " (sanitized)" } else { "" };
                format!("[sql{note}] {text}")
            }
            MessagePayload::Result { result } => format!("[result] {} row(s)", result.row_count()),
            MessagePayload::Confirmation {
                operation_kind,
                risk_tier,
                statement,
                ..
            } => format!("[confirm {operation_kind}/{risk_tier}] {statement}"),
        };
        format!("{who}: {body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ConversationMessage::user("hi").kind(), MessageKind::Text);
        let sql = ConversationMessage::new(
            Role::Assistant,
            MessagePayload::Sql {
                text: "SELECT 1".into(),
                was_modified: false,
            },
        );
        assert_eq!(sql.kind(), MessageKind::SqlQuery);
    }

    #[test]
    fn test_prompt_text_skips_steps() {
        assert_eq!(ConversationMessage::step("Generating SQL").prompt_text(), None);
        assert_eq!(
            ConversationMessage::user("count orders").prompt_text().as_deref(),
            Some("count orders")
        );
    }

    #[test]
    fn test_payload_serializes_tagged() {
        let msg = ConversationMessage::assistant("Hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["payload"]["type"], "text");
        assert_eq!(json["payload"]["text"], "Hello");
    }

    #[test]
    fn test_summary() {
        let msg = ConversationMessage::new(
            Role::Assistant,
            MessagePayload::Sql {
                text: "SELECT * FROM \"order-items\"".into(),
                was_modified: true,
            },
        );
        assert_eq!(msg.summary(), "assistant: [sql (sanitized)] SELECT * FROM \"order-items\"");
    }
}
