//! Conversation sessions end to end, with mock generator and executor.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use pretty_assertions::assert_eq;
use querygate::catalog::StaticCatalog;
use querygate::config::SessionConfig;
use querygate::db::{Column, FailingExecutor, MockExecutor, QueryExecutor, Schema, Table};
use querygate::error::GateError;
use querygate::gate::GateState;
use querygate::llm::MockGenerator;
use querygate::safety::{OperationKind, RiskTier, SqlClassifier};
use querygate::session::{
    Collaborators, ConversationSession, DataSourceChange, MessageKind, SessionActor,
    SessionHandle, TurnEvent,
};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_source(
            "shop",
            "postgres://app@localhost/shop",
            Schema {
                tables: vec![
                    Table::new("table-name").with_column(Column::new("id", "integer")),
                    Table::new("user-accounts").with_column(Column::new("id", "integer")),
                ],
                foreign_keys: vec![],
            },
        )
        .with_source(
            "legacy",
            "mysql",
            Schema {
                tables: vec![Table::new("table-name")],
                foreign_keys: vec![],
            },
        )
}

fn generator() -> MockGenerator {
    MockGenerator::new()
        .with_sql("wipe", "DELETE FROM table-name")
        .with_sql("accounts", "SELECT * FROM user-accounts")
        .with_sql("rename", "ALTER TABLE table-name RENAME TO things")
}

struct Harness {
    handle: SessionHandle,
    task: JoinHandle<()>,
    generator: MockGenerator,
}

impl Harness {
    fn start(generator: MockGenerator, executor: Arc<dyn QueryExecutor>, config: SessionConfig) -> Self {
        let mut session = ConversationSession::new(&config);
        session.on_data_source_change("shop");
        let collaborators = Collaborators {
            generator: Arc::new(generator.clone()),
            catalog: Arc::new(catalog()),
            executor,
            classifier: SqlClassifier::default(),
        };
        let (handle, actor) = SessionActor::spawn(session, collaborators);
        Self {
            handle,
            task: tokio::spawn(actor.run()),
            generator,
        }
    }

    async fn stop(self) {
        self.handle.close().await.unwrap();
        timeout(WAIT, self.task).await.unwrap().unwrap();
    }
}

async fn collect(stream: BoxStream<'static, TurnEvent>) -> Vec<TurnEvent> {
    timeout(WAIT, stream.collect::<Vec<_>>()).await.unwrap()
}

fn session_config() -> SessionConfig {
    SessionConfig {
        greeting: "Welcome!".to_string(),
        ..SessionConfig::default()
    }
}

#[tokio::test]
async fn test_scenario_c_through_session() {
    let executor = MockExecutor::new();
    let harness = Harness::start(generator(), Arc::new(executor.clone()), session_config());

    let events = collect(harness.handle.submit("wipe the table").await.unwrap()).await;
    assert_eq!(
        events[1],
        TurnEvent::SqlGenerated {
            text: "DELETE FROM \"table-name\"".into(),
            was_modified: true,
        }
    );
    let Some(TurnEvent::ConfirmationRequested {
        operation_kind,
        risk_tier,
        statement,
        ..
    }) = events.last()
    else {
        panic!("expected a confirmation request, got {events:?}");
    };
    assert_eq!(*operation_kind, OperationKind::Delete);
    assert_eq!(*risk_tier, RiskTier::High);
    assert_eq!(statement, "DELETE FROM \"table-name\"");

    harness.handle.cancel(None).await.unwrap();
    let snapshot = harness.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.gate_state, GateState::Idle);
    assert!(!snapshot.processing);
    assert!(executor.executed().is_empty());

    harness.stop().await;
}

#[tokio::test]
async fn test_scenario_d_busy_submit_is_rejected() {
    let generator = generator().with_delay(Duration::from_millis(300));
    let harness = Harness::start(generator, Arc::new(MockExecutor::new()), session_config());

    let first = harness.handle.submit("accounts").await.unwrap();
    let before = harness.handle.snapshot().await.unwrap();
    assert!(before.processing);

    let second = harness.handle.submit("accounts again").await;
    assert!(matches!(second, Err(GateError::SessionBusy)));

    let after = harness.handle.snapshot().await.unwrap();
    assert!(after.processing);
    assert_eq!(after.history.len(), before.history.len());

    collect(first).await;
    assert!(!harness.handle.snapshot().await.unwrap().processing);
    assert_eq!(harness.generator.calls().len(), 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_scenario_e_switch_mid_conversation() {
    let executor = MockExecutor::new();
    let harness = Harness::start(generator(), Arc::new(executor.clone()), session_config());

    collect(harness.handle.submit("accounts").await.unwrap()).await;
    collect(harness.handle.submit("wipe it").await.unwrap()).await;
    assert_eq!(
        harness.handle.snapshot().await.unwrap().gate_state,
        GateState::AwaitingConfirmation
    );

    let change = harness.handle.switch_data_source("legacy").await.unwrap();
    assert!(matches!(change, DataSourceChange::Switched { cancelled: Some(_) }));

    let snapshot = harness.handle.snapshot().await.unwrap();
    let history: Vec<_> = snapshot.history.iter().map(|m| m.summary()).collect();
    assert_eq!(history, vec!["assistant: Welcome!"]);
    assert_eq!(snapshot.gate_state, GateState::Idle);
    assert_eq!(executor.executed(), vec!["SELECT * FROM \"user-accounts\""]);

    // The new source quotes with backticks.
    collect(harness.handle.submit("wipe it").await.unwrap()).await;
    let events = collect(harness.handle.confirm(None).await.unwrap()).await;
    assert!(matches!(events.last(), Some(TurnEvent::Result { .. })));
    assert_eq!(executor.executed()[1], "DELETE FROM `table-name`");

    harness.stop().await;
}

#[tokio::test]
async fn test_same_source_switch_is_noop() {
    let harness = Harness::start(generator(), Arc::new(MockExecutor::new()), session_config());
    collect(harness.handle.submit("accounts").await.unwrap()).await;

    let change = harness.handle.switch_data_source("shop").await.unwrap();
    assert_eq!(change, DataSourceChange::Unchanged);
    assert!(harness.handle.snapshot().await.unwrap().history.len() > 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_history_order_for_a_read_turn() {
    let harness = Harness::start(generator(), Arc::new(MockExecutor::new()), session_config());
    collect(harness.handle.submit("accounts").await.unwrap()).await;

    let kinds: Vec<_> = harness
        .handle
        .snapshot()
        .await
        .unwrap()
        .history
        .iter()
        .map(|m| m.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            MessageKind::Text,        // greeting
            MessageKind::Text,        // question
            MessageKind::Text,        // generating step
            MessageKind::SqlQuery,
            MessageKind::Text,        // running step
            MessageKind::QueryResult,
        ]
    );

    harness.stop().await;
}

#[tokio::test]
async fn test_generator_sees_bounded_history() {
    let config = SessionConfig {
        max_context_messages: 4,
        ..session_config()
    };
    let harness = Harness::start(generator(), Arc::new(MockExecutor::new()), config);

    collect(harness.handle.submit("accounts").await.unwrap()).await;
    collect(harness.handle.submit("accounts").await.unwrap()).await;

    let calls = harness.generator.calls();
    assert_eq!(calls[0].history_len, 1);
    assert_eq!(calls[1].history_len, 4);

    harness.stop().await;
}

#[tokio::test]
async fn test_execution_error_ends_turn_and_keeps_history() {
    let harness = Harness::start(
        generator(),
        Arc::new(FailingExecutor::new("relation does not exist")),
        session_config(),
    );

    let events = collect(harness.handle.submit("accounts").await.unwrap()).await;
    let Some(TurnEvent::Error { kind, message }) = events.last() else {
        panic!("expected an error, got {events:?}");
    };
    assert_eq!(kind, "ExecutionError");
    assert!(message.contains("relation does not exist"));

    let snapshot = harness.handle.snapshot().await.unwrap();
    assert!(!snapshot.processing);
    assert_eq!(snapshot.history.iter().filter(|m| m.kind() == MessageKind::SqlQuery).count(), 1);

    // The session accepts the next question.
    assert!(harness.handle.submit("accounts").await.is_ok());

    harness.stop().await;
}

#[tokio::test]
async fn test_reset_clears_to_greeting() {
    let harness = Harness::start(generator(), Arc::new(MockExecutor::new()), session_config());
    collect(harness.handle.submit("rename the table").await.unwrap()).await;

    harness.handle.reset_conversation().await.unwrap();
    let snapshot = harness.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(snapshot.gate_state, GateState::Idle);
    assert_eq!(snapshot.data_source_id.as_deref(), Some("shop"));

    harness.stop().await;
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let executor = MockExecutor::new();
    let a = Harness::start(generator(), Arc::new(executor.clone()), session_config());
    let b = Harness::start(generator(), Arc::new(executor.clone()), session_config());

    collect(a.handle.submit("wipe it").await.unwrap()).await;
    collect(b.handle.submit("accounts").await.unwrap()).await;

    assert_eq!(
        a.handle.snapshot().await.unwrap().gate_state,
        GateState::AwaitingConfirmation
    );
    assert_eq!(b.handle.snapshot().await.unwrap().gate_state, GateState::Idle);
    assert!(matches!(
        b.handle.confirm(None).await,
        Err(GateError::NoPendingConfirmation)
    ));

    a.stop().await;
    b.stop().await;
}
