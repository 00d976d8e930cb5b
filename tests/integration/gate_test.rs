//! Confirmation gate safety with a recording executor.

use chrono::Utc;
use querygate::db::{MockExecutor, QueryExecutor};
use querygate::error::GateError;
use querygate::gate::{ConfirmationGate, GateOutcome, GateState, RequestId};
use querygate::safety::SqlClassifier;
use querygate::sanitize::SqlStatement;

fn admit(gate: &mut ConfirmationGate, sql: &str) -> Result<GateOutcome, GateError> {
    let classification = SqlClassifier::default().classify(sql);
    gate.admit(SqlStatement::unmodified(sql), &classification, Utc::now())
}

#[tokio::test]
async fn test_scenario_c_cancel_never_executes() {
    let executor = MockExecutor::new();
    let mut gate = ConfirmationGate::default();

    let outcome = admit(&mut gate, "DELETE FROM \"table-name\"").unwrap();
    let GateOutcome::AwaitConfirmation(request) = outcome else {
        panic!("DELETE must wait for confirmation");
    };
    assert_eq!(gate.state(), GateState::AwaitingConfirmation);

    let cancelled = gate.cancel(Some(request.id)).unwrap();
    assert_eq!(cancelled.statement.sanitized_text(), "DELETE FROM \"table-name\"");
    assert_eq!(gate.state(), GateState::Idle);
    assert_eq!(gate.confirm(None, Utc::now()), Err(GateError::NoPendingConfirmation));
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_only_confirmed_mutations_reach_executor() {
    let executor = MockExecutor::new();
    let mut gate = ConfirmationGate::default();
    let script = [
        ("SELECT 1", None),
        ("UPDATE t SET a = 1", Some(true)),
        ("DROP TABLE t", Some(false)),
        ("WITH x AS (SELECT 1) SELECT * FROM x", None),
        ("INSERT INTO t VALUES (1)", Some(true)),
        ("TRUNCATE t", Some(false)),
        ("VACUUM", Some(true)),
    ];

    let mut expected = Vec::new();
    for (sql, decision) in script {
        match admit(&mut gate, sql).unwrap() {
            GateOutcome::Execute(approved) => {
                assert_eq!(decision, None, "{sql} bypassed the gate");
                executor.run(&approved).await.unwrap();
                expected.push(sql.to_string());
            }
            GateOutcome::AwaitConfirmation(request) => match decision {
                Some(true) => {
                    let approved = gate.confirm(Some(request.id), Utc::now()).unwrap();
                    assert_eq!(approved.request_id(), Some(request.id));
                    executor.run(&approved).await.unwrap();
                    expected.push(sql.to_string());
                }
                Some(false) => {
                    gate.cancel(None).unwrap();
                }
                None => panic!("{sql} should not need confirmation"),
            },
        }
        assert_eq!(gate.state(), GateState::Idle);
    }

    assert_eq!(executor.executed(), expected);
}

#[test]
fn test_second_mutation_does_not_replace_pending() {
    let mut gate = ConfirmationGate::default();
    let GateOutcome::AwaitConfirmation(first) = admit(&mut gate, "DELETE FROM a").unwrap() else {
        panic!("expected confirmation");
    };

    assert_eq!(
        admit(&mut gate, "DROP TABLE b"),
        Err(GateError::ConfirmationAlreadyPending)
    );
    assert!(matches!(admit(&mut gate, "SELECT 1"), Ok(GateOutcome::Execute(_))));
    assert_eq!(gate.pending().map(|r| r.id), Some(first.id));

    assert_eq!(
        gate.confirm(Some(RequestId::new()), Utc::now()),
        Err(GateError::ConfirmationMismatch)
    );
    let approved = gate.confirm(Some(first.id), Utc::now()).unwrap();
    assert_eq!(approved.sql(), "DELETE FROM a");
}
