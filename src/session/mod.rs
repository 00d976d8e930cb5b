//! Conversation sessions.
//!
//! A [`ConversationSession`] owns one user's history, active data source,
//! in-flight flag and confirmation gate. It is plain state with no I/O; the
//! [`actor`] module drives it through turns.

pub mod actor;
pub mod events;
pub mod message;

pub use actor::{Collaborators, SessionActor, SessionHandle, SessionSnapshot};
pub use events::TurnEvent;
pub use message::{ConversationMessage, MessageKind, MessagePayload, Role};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{GateError, Result};
use crate::gate::{
    ApprovedStatement, ConfirmationGate, ConfirmationRequest, GateOutcome, GateState, RequestId,
};
use crate::safety::Classification;
use crate::sanitize::SqlStatement;

/// Text appended when a pending statement is dropped without running.
pub const CANCELLED_TEXT: &str = "Query cancelled.";

/// Text appended when a pending statement outlives its timeout.
pub const EXPIRED_TEXT: &str = "The confirmation request expired. The query was not run.";

/// What a data source change did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceChange {
    /// First assignment; history kept.
    Initial,
    /// Same id as before; nothing happened.
    Unchanged,
    /// History cleared and re-greeted. Carries the request that was
    /// implicitly cancelled, if one was pending.
    Switched {
        cancelled: Option<ConfirmationRequest>,
    },
}

/// Per-user conversation state.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: Uuid,
    data_source_id: Option<String>,
    history: Vec<ConversationMessage>,
    processing: bool,
    gate: ConfirmationGate,
    greeting: String,
    max_context_messages: usize,
}

impl ConversationSession {
    /// Creates a session holding only the greeting.
    pub fn new(config: &SessionConfig) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            data_source_id: None,
            history: Vec::new(),
            processing: false,
            gate: ConfirmationGate::new(config.confirmation_timeout()),
            greeting: config.greeting.clone(),
            max_context_messages: config.max_context_messages,
        };
        session.greet();
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn data_source_id(&self) -> Option<&str> {
        self.data_source_id.as_deref()
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    /// True while a turn is in flight, including while it awaits confirmation.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn pending(&self) -> Option<&ConfirmationRequest> {
        self.gate.pending()
    }

    pub fn confirmation_deadline(&self) -> Option<DateTime<Utc>> {
        self.gate.deadline()
    }

    /// The most recent history messages passed to the generator.
    pub fn context_window(&self) -> &[ConversationMessage] {
        let start = self.history.len().saturating_sub(self.max_context_messages);
        &self.history[start..]
    }

    /// Starts a turn: sets the in-flight flag and records the question.
    ///
    /// Fails with [`GateError::SessionBusy`] if a turn is already in flight;
    /// the flag and history are left as they were.
    pub fn begin_turn(&mut self, question: &str) -> Result<()> {
        if self.processing {
            return Err(GateError::SessionBusy);
        }
        self.processing = true;
        self.history.push(ConversationMessage::user(question));
        debug!(session = %self.id, "Turn started");
        Ok(())
    }

    /// Clears the in-flight flag.
    pub fn end_turn(&mut self) {
        if self.processing {
            debug!(session = %self.id, "Turn finished");
        }
        self.processing = false;
    }

    /// Appends a message to the history.
    pub fn append(&mut self, message: ConversationMessage) -> &ConversationMessage {
        self.history.push(message);
        &self.history[self.history.len() - 1]
    }

    /// Appends a step announcement.
    pub fn announce(&mut self, step: impl Into<String>) -> &ConversationMessage {
        self.append(ConversationMessage::step(step))
    }

    /// Passes a statement through the gate. A gated statement is recorded as
    /// a confirmation prompt and the turn stays in flight.
    pub fn admit(
        &mut self,
        statement: SqlStatement,
        classification: &Classification,
        now: DateTime<Utc>,
    ) -> Result<GateOutcome> {
        let outcome = self.gate.admit(statement, classification, now)?;
        if let GateOutcome::AwaitConfirmation(request) = &outcome {
            self.history.push(ConversationMessage::new(
                Role::Assistant,
                MessagePayload::Confirmation {
                    request_id: request.id,
                    statement: request.statement.sanitized_text().to_string(),
                    operation_kind: request.operation_kind,
                    risk_tier: request.risk_tier,
                },
            ));
        }
        Ok(outcome)
    }

    /// Confirms the pending request. The turn stays in flight until the
    /// released statement has run.
    pub fn confirm(&mut self, id: Option<RequestId>, now: DateTime<Utc>) -> Result<ApprovedStatement> {
        match self.gate.confirm(id, now) {
            Err(GateError::ConfirmationExpired) => {
                self.history.push(ConversationMessage::assistant(EXPIRED_TEXT));
                self.end_turn();
                Err(GateError::ConfirmationExpired)
            }
            other => other,
        }
    }

    /// Cancels the pending request and ends the suspended turn.
    pub fn cancel(&mut self, id: Option<RequestId>) -> Result<ConfirmationRequest> {
        let request = self.gate.cancel(id)?;
        self.history.push(ConversationMessage::assistant(CANCELLED_TEXT));
        self.end_turn();
        Ok(request)
    }

    /// Drops the pending request if its deadline has passed.
    pub fn expire_pending(&mut self, now: DateTime<Utc>) -> Option<ConfirmationRequest> {
        let expired = self.gate.expire_if_due(now)?;
        self.history.push(ConversationMessage::assistant(EXPIRED_TEXT));
        self.end_turn();
        Some(expired)
    }

    /// Abandons the current turn. Messages already appended stay; a pending
    /// request is cancelled.
    pub fn abort(&mut self) -> Option<ConfirmationRequest> {
        let cancelled = self.gate.discard();
        if self.processing || cancelled.is_some() {
            self.history.push(ConversationMessage::assistant(CANCELLED_TEXT));
        }
        self.end_turn();
        cancelled
    }

    /// Points the session at another data source.
    ///
    /// Switching away from an already-set id clears the history, cancels any
    /// pending request and greets again. The first assignment and a repeat of
    /// the current id change nothing else.
    pub fn on_data_source_change(&mut self, new_id: &str) -> DataSourceChange {
        match self.data_source_id.as_deref() {
            Some(current) if current == new_id => DataSourceChange::Unchanged,
            None => {
                self.data_source_id = Some(new_id.to_string());
                DataSourceChange::Initial
            }
            Some(previous) => {
                info!(session = %self.id, from = previous, to = new_id, "Switching data source");
                self.data_source_id = Some(new_id.to_string());
                DataSourceChange::Switched {
                    cancelled: self.restart(),
                }
            }
        }
    }

    /// Clears the conversation back to a fresh greeting, keeping the data source.
    pub fn reset(&mut self) -> Option<ConfirmationRequest> {
        info!(session = %self.id, "Resetting conversation");
        self.restart()
    }

    fn restart(&mut self) -> Option<ConfirmationRequest> {
        let cancelled = self.gate.discard();
        self.processing = false;
        self.history.clear();
        self.greet();
        cancelled
    }

    fn greet(&mut self) {
        self.history
            .push(ConversationMessage::assistant(self.greeting.clone()));
    }
}
