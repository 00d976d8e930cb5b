//! Actor that runs conversation turns.
//!
//! One actor owns one [`ConversationSession`]. Callers talk to it through a
//! cloneable [`SessionHandle`]; every command carries a oneshot reply and
//! turn events flow back over a per-turn channel. While generation or
//! execution is in flight the actor keeps reading commands, so an abort,
//! a snapshot or a rejected second submit are answered immediately.
//!
//! A turn suspended on a confirmation does not block the actor: the gate
//! holds the request and the actor returns to its idle loop, arming a timer
//! for the confirmation deadline.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    ConversationMessage, ConversationSession, DataSourceChange, MessagePayload, Role, TurnEvent,
};
use crate::catalog::SchemaCatalog;
use crate::db::QueryExecutor;
use crate::error::{GateError, Result};
use crate::gate::{ApprovedStatement, ConfirmationRequest, GateOutcome, GateState, RequestId};
use crate::llm::SqlGenerator;
use crate::pipeline;
use crate::safety::SqlClassifier;

/// Capacity of the command channel.
const COMMAND_BUFFER: usize = 32;

type EventSender = mpsc::UnboundedSender<TurnEvent>;

/// The external services a session calls during a turn.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn SqlGenerator>,
    pub catalog: Arc<dyn SchemaCatalog>,
    pub executor: Arc<dyn QueryExecutor>,
    pub classifier: SqlClassifier,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub data_source_id: Option<String>,
    pub processing: bool,
    pub gate_state: GateState,
    pub pending: Option<ConfirmationRequest>,
    pub history: Vec<ConversationMessage>,
}

/// Commands sent from handles to the actor.
#[derive(Debug)]
enum SessionCommand {
    Submit {
        question: String,
        events: EventSender,
        reply: oneshot::Sender<Result<()>>,
    },
    Confirm {
        id: Option<RequestId>,
        events: EventSender,
        reply: oneshot::Sender<Result<()>>,
    },
    Cancel {
        id: Option<RequestId>,
        reply: oneshot::Sender<Result<()>>,
    },
    Abort {
        reply: oneshot::Sender<()>,
    },
    SwitchDataSource {
        id: String,
        reply: oneshot::Sender<DataSourceChange>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown,
}

/// What to do with a command that arrives while a turn is in flight.
#[derive(Debug)]
enum BusyAction {
    /// Answer right away; the turn keeps running.
    Answer(SessionCommand),
    /// Stop the turn, then handle the command once the session is idle.
    CancelThenRun(SessionCommand),
    /// Stop the turn and acknowledge.
    Abort(oneshot::Sender<()>),
    /// Stop the turn and the actor.
    Shutdown,
}

/// The session actor.
pub struct SessionActor {
    session: ConversationSession,
    collaborators: Collaborators,
    receiver: mpsc::Receiver<SessionCommand>,
    deferred: VecDeque<SessionCommand>,
    cancel_reason: Option<&'static str>,
    shutting_down: bool,
}

impl SessionActor {
    /// Creates an actor for `session` and returns a handle to it.
    pub fn spawn(session: ConversationSession, collaborators: Collaborators) -> (SessionHandle, Self) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);

        let actor = Self {
            session,
            collaborators,
            receiver,
            deferred: VecDeque::new(),
            cancel_reason: None,
            shutting_down: false,
        };

        (SessionHandle { sender }, actor)
    }

    /// Runs the actor loop until Shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        debug!(session = %self.session.id(), "Session actor started");

        loop {
            while let Some(cmd) = self.deferred.pop_front() {
                self.handle(cmd).await;
            }
            if self.shutting_down {
                break;
            }

            let deadline = self.session.confirmation_deadline();
            tokio::select! {
                biased;

                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },

                _ = wait_until(deadline) => {
                    if let Some(request) = self.session.expire_pending(Utc::now()) {
                        info!(request_id = %request.id, "Pending statement dropped on timeout");
                    }
                }
            }
        }

        if let Some(request) = self.session.abort() {
            debug!(request_id = %request.id, "Dropping pending confirmation on shutdown");
        }
        debug!(session = %self.session.id(), "Session actor stopped");
    }

    /// Handles a command while no turn is in flight.
    async fn handle(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Submit {
                question,
                events,
                reply,
            } => {
                let context = self.session.context_window().to_vec();
                if let Err(e) = self.session.begin_turn(&question) {
                    let _ = reply.send(Err(e));
                    return;
                }
                let _ = reply.send(Ok(()));
                self.run_turn(question, context, events).await;
            }
            SessionCommand::Confirm { id, events, reply } => {
                match self.session.confirm(id, Utc::now()) {
                    Ok(approved) => {
                        let _ = reply.send(Ok(()));
                        self.execute(approved, &events).await;
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            SessionCommand::Cancel { id, reply } => {
                let _ = reply.send(self.session.cancel(id).map(|_| ()));
            }
            SessionCommand::Abort { reply } => {
                self.session.abort();
                let _ = reply.send(());
            }
            SessionCommand::SwitchDataSource { id, reply } => {
                let _ = reply.send(self.session.on_data_source_change(&id));
            }
            SessionCommand::Reset { reply } => {
                self.session.reset();
                let _ = reply.send(());
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::Shutdown => self.shutting_down = true,
        }
    }

    /// Generates, prepares and gates one question.
    async fn run_turn(
        &mut self,
        question: String,
        context: Vec<ConversationMessage>,
        events: EventSender,
    ) {
        let Some(data_source) = self.session.data_source_id().map(str::to_string) else {
            self.fail_turn(&events, GateError::catalog("No data source selected"));
            return;
        };

        self.record(&events, ConversationMessage::step("Generating SQL"));

        let catalog = Arc::clone(&self.collaborators.catalog);
        let generator = Arc::clone(&self.collaborators.generator);
        let work = async move {
            let schema = catalog.schema(&data_source).await?;
            let identifiers = catalog.known_identifiers(&data_source).await?;
            let descriptor = catalog.dialect_of(&data_source).await?;
            let candidate = generator.generate(&question, &schema, &context).await?;
            Ok::<_, GateError>((candidate, identifiers, descriptor))
        };

        let (candidate, identifiers, descriptor) = match self.drive(work).await {
            None => return self.abandon_turn(&events),
            Some(Err(e)) => return self.fail_turn(&events, e),
            Some(Ok(generated)) => generated,
        };

        let Some(sql) = candidate.sql.as_deref() else {
            self.record(&events, ConversationMessage::assistant(candidate.explanation));
            self.session.end_turn();
            return;
        };

        if candidate.is_low_confidence() {
            self.record(
                &events,
                ConversationMessage::step(format!(
                    "Low confidence ({:.2}). Review the SQL carefully.",
                    candidate.confidence
                )),
            );
        }

        let prepared = pipeline::prepare(
            sql,
            &identifiers,
            &descriptor,
            &self.collaborators.classifier,
        );
        self.record(
            &events,
            ConversationMessage::new(
                Role::Assistant,
                MessagePayload::Sql {
                    text: prepared.statement.sanitized_text().to_string(),
                    was_modified: prepared.statement.was_modified(),
                },
            ),
        );

        match self
            .session
            .admit(prepared.statement, &prepared.classification, Utc::now())
        {
            Ok(GateOutcome::Execute(approved)) => self.execute(approved, &events).await,
            Ok(GateOutcome::AwaitConfirmation(_)) => {
                // The session recorded the prompt; the turn stays in flight.
                if let Some(event) = self.session.history().last().and_then(TurnEvent::from_message) {
                    let _ = events.send(event);
                }
            }
            Err(e) => self.fail_turn(&events, e),
        }
    }

    /// Runs an approved statement and records its outcome.
    async fn execute(&mut self, approved: ApprovedStatement, events: &EventSender) {
        self.record(events, ConversationMessage::step("Running query"));

        let executor = Arc::clone(&self.collaborators.executor);
        let work = async move { executor.run(&approved).await };

        match self.drive(work).await {
            None => self.abandon_turn(events),
            Some(Err(e)) => self.fail_turn(events, e),
            Some(Ok(result)) => {
                self.record(
                    events,
                    ConversationMessage::new(Role::Assistant, MessagePayload::Result { result }),
                );
                self.session.end_turn();
            }
        }
    }

    /// Awaits `work` while still serving commands.
    ///
    /// Returns None if the turn was cancelled before `work` finished.
    async fn drive<T>(&mut self, work: impl Future<Output = Result<T>>) -> Option<Result<T>> {
        let cancel = CancellationToken::new();
        tokio::pin!(work);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return None,

                result = &mut work => return Some(result),

                cmd = self.receiver.recv() => {
                    let action = match cmd {
                        Some(cmd) => Self::classify_busy(cmd),
                        None => BusyAction::Shutdown,
                    };
                    self.apply_busy(action, &cancel);
                }
            }
        }
    }

    /// Decides how a command interrupts an in-flight turn.
    fn classify_busy(cmd: SessionCommand) -> BusyAction {
        match cmd {
            SessionCommand::Abort { reply } => BusyAction::Abort(reply),
            SessionCommand::SwitchDataSource { .. } | SessionCommand::Reset { .. } => {
                BusyAction::CancelThenRun(cmd)
            }
            SessionCommand::Shutdown => BusyAction::Shutdown,
            other => BusyAction::Answer(other),
        }
    }

    fn apply_busy(&mut self, action: BusyAction, cancel: &CancellationToken) {
        match action {
            BusyAction::Answer(SessionCommand::Submit { reply, .. }) => {
                let _ = reply.send(Err(GateError::SessionBusy));
            }
            BusyAction::Answer(
                SessionCommand::Confirm { reply, .. } | SessionCommand::Cancel { reply, .. },
            ) => {
                let _ = reply.send(Err(GateError::NoPendingConfirmation));
            }
            BusyAction::Answer(SessionCommand::Snapshot { reply }) => {
                let _ = reply.send(self.snapshot());
            }
            BusyAction::Answer(other) => self.deferred.push_back(other),
            BusyAction::CancelThenRun(cmd) => {
                self.cancel_reason.get_or_insert("Conversation changed");
                self.deferred.push_back(cmd);
                cancel.cancel();
            }
            BusyAction::Abort(reply) => {
                self.cancel_reason.get_or_insert("Aborted by user");
                cancel.cancel();
                let _ = reply.send(());
            }
            BusyAction::Shutdown => {
                self.cancel_reason.get_or_insert("Session closed");
                self.shutting_down = true;
                cancel.cancel();
            }
        }
    }

    /// Appends a message and streams its event.
    fn record(&mut self, events: &EventSender, message: ConversationMessage) {
        if let Some(event) = TurnEvent::from_message(&message) {
            let _ = events.send(event);
        }
        self.session.append(message);
    }

    /// Ends the turn with an error message.
    fn fail_turn(&mut self, events: &EventSender, error: GateError) {
        warn!(session = %self.session.id(), kind = error.kind(), error = %error, "Turn failed");
        self.record(
            events,
            ConversationMessage::new(
                Role::Assistant,
                MessagePayload::Error {
                    kind: error.kind().to_string(),
                    message: error.to_string(),
                },
            ),
        );
        self.session.end_turn();
    }

    /// Ends a cancelled turn. Already-recorded steps stay in history.
    fn abandon_turn(&mut self, events: &EventSender) {
        let reason = self.cancel_reason.take().unwrap_or("Cancelled");
        info!(session = %self.session.id(), reason, "Turn cancelled");
        self.session.abort();
        let _ = events.send(TurnEvent::Cancelled {
            reason: reason.to_string(),
        });
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.session.id(),
            data_source_id: self.session.data_source_id().map(str::to_string),
            processing: self.session.is_processing(),
            gate_state: self.session.gate_state(),
            pending: self.session.pending().cloned(),
            history: self.session.history().to_vec(),
        }
    }
}

/// Sleeps until `deadline`, or forever if there is none.
async fn wait_until(deadline: Option<DateTime<Utc>>) {
    match deadline {
        Some(deadline) => {
            let remaining = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(remaining).await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn event_stream(receiver: mpsc::UnboundedReceiver<TurnEvent>) -> BoxStream<'static, TurnEvent> {
    stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|event| (event, receiver))
    })
    .boxed()
}

/// Handle for communicating with a session actor.
///
/// Lightweight and cloneable. Every method waits for the actor's answer.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| GateError::internal("Session actor closed"))?;
        response
            .await
            .map_err(|_| GateError::internal("Session actor dropped the request"))
    }

    /// Starts a turn for `question`.
    ///
    /// The stream yields the turn's events and ends when the turn finishes
    /// or suspends on a confirmation. Fails with [`GateError::SessionBusy`]
    /// if a turn is already in flight.
    pub async fn submit(&self, question: impl Into<String>) -> Result<BoxStream<'static, TurnEvent>> {
        let question = question.into();
        let (events, receiver) = mpsc::unbounded_channel();
        self.request(|reply| SessionCommand::Submit {
            question,
            events,
            reply,
        })
        .await??;
        Ok(event_stream(receiver))
    }

    /// Confirms the pending statement and streams its execution.
    pub async fn confirm(&self, id: Option<RequestId>) -> Result<BoxStream<'static, TurnEvent>> {
        let (events, receiver) = mpsc::unbounded_channel();
        self.request(|reply| SessionCommand::Confirm { id, events, reply })
            .await??;
        Ok(event_stream(receiver))
    }

    /// Cancels the pending statement.
    pub async fn cancel(&self, id: Option<RequestId>) -> Result<()> {
        self.request(|reply| SessionCommand::Cancel { id, reply }).await?
    }

    /// Stops the in-flight turn and cancels any pending statement.
    pub async fn abort(&self) -> Result<()> {
        self.request(|reply| SessionCommand::Abort { reply }).await
    }

    pub async fn switch_data_source(&self, id: impl Into<String>) -> Result<DataSourceChange> {
        let id = id.into();
        self.request(|reply| SessionCommand::SwitchDataSource { id, reply })
            .await
    }

    pub async fn reset_conversation(&self) -> Result<()> {
        self.request(|reply| SessionCommand::Reset { reply }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Signals the actor to stop.
    pub async fn close(&self) -> Result<()> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| GateError::internal("Session actor already closed"))
    }
}
