//! Events streamed to the presentation layer during a turn.

use serde::Serialize;

use crate::db::QueryResult;
use crate::gate::RequestId;
use crate::safety::{OperationKind, RiskTier};
use crate::session::message::{ConversationMessage, MessagePayload, Role};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TurnEvent {
    StepAnnouncement {
        step: String,
    },
    SqlGenerated {
        text: String,
        was_modified: bool,
    },
    ConfirmationRequested {
        request_id: RequestId,
        statement: String,
        operation_kind: OperationKind,
        risk_tier: RiskTier,
    },
    Result {
        result: QueryResult,
    },
    /// The generator answered in prose instead of SQL.
    Reply {
        text: String,
    },
    Error {
        kind: String,
        message: String,
    },
    Cancelled {
        reason: String,
    },
}

impl TurnEvent {
    /// The event announcing an assistant message. User messages have none.
    pub fn from_message(message: &ConversationMessage) -> Option<Self> {
        if message.role == Role::User {
            return None;
        }
        Some(match &message.payload {
            MessagePayload::Text { text } => Self::Reply { text: text.clone() },
            MessagePayload::Step { step } => Self::StepAnnouncement { step: step.clone() },
            MessagePayload::Error { kind, message } => Self::Error {
                kind: kind.clone(),
                message: message.clone(),
            },
            MessagePayload::Sql { text, was_modified } => Self::SqlGenerated {
                text: text.clone(),
                was_modified: *was_modified,
            },
            MessagePayload::Result { result } => Self::Result {
                result: result.clone(),
            },
            MessagePayload::Confirmation {
                request_id,
                statement,
                operation_kind,
                risk_tier,
            } => Self::ConfirmationRequested {
                request_id: *request_id,
                statement: statement.clone(),
                operation_kind: *operation_kind,
                risk_tier: *risk_tier,
            },
        })
    }

    /// True for events after which the turn stream closes.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::StepAnnouncement { .. } | Self::SqlGenerated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_have_no_event() {
        assert_eq!(TurnEvent::from_message(&ConversationMessage::user("hi")), None);
    }

    #[test]
    fn test_step_event() {
        let event = TurnEvent::from_message(&ConversationMessage::step("Generating SQL")).unwrap();
        assert_eq!(
            event,
            TurnEvent::StepAnnouncement {
                step: "Generating SQL".into()
            }
        );
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_serializes_kebab_case_tag() {
        let event = TurnEvent::SqlGenerated {
            text: "SELECT 1".into(),
            was_modified: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "sql-generated");
        assert_eq!(json["was_modified"], false);
        assert!(TurnEvent::Cancelled { reason: "x".into() }.is_terminal());
    }
}
