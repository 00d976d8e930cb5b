//! Executors for tests and dry runs.
//!
//! Neither talks to a database. [`MockExecutor`] records every statement it
//! is handed; [`FailingExecutor`] rejects everything.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{ColumnInfo, QueryExecutor, QueryResult, Value};
use crate::error::{GateError, Result};
use crate::gate::ApprovedStatement;
use crate::safety::OperationKind;

/// An executor that records statements and returns canned results.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    executed: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every run take `delay` before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The SQL text of every statement run so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn run(&self, statement: &ApprovedStatement) -> Result<QueryResult> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(statement.sql().to_string());

        let result = match statement.kind() {
            OperationKind::Read => QueryResult::with_rows(
                vec![ColumnInfo::new("result", "text")],
                vec![vec![Value::String(format!(
                    "Mock result for: {}",
                    statement.sql()
                ))]],
            ),
            _ => QueryResult::affected(0),
        };
        Ok(result.with_execution_time(Duration::from_millis(1)))
    }
}

/// An executor whose every run fails with the given message.
#[derive(Debug, Clone)]
pub struct FailingExecutor {
    message: String,
}

impl FailingExecutor {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl QueryExecutor for FailingExecutor {
    async fn run(&self, _statement: &ApprovedStatement) -> Result<QueryResult> {
        Err(GateError::execution(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{ConfirmationGate, GateOutcome};
    use crate::safety::SqlClassifier;
    use crate::sanitize::SqlStatement;
    use chrono::Utc;

    fn approve(sql: &str) -> ApprovedStatement {
        let mut gate = ConfirmationGate::default();
        let classification = SqlClassifier::default().classify(sql);
        match gate
            .admit(SqlStatement::unmodified(sql), &classification, Utc::now())
            .unwrap()
        {
            GateOutcome::Execute(approved) => approved,
            GateOutcome::AwaitConfirmation(_) => gate.confirm(None, Utc::now()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_mock_select() {
        let executor = MockExecutor::new();
        let result = executor.run(&approve("SELECT 1")).await.unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.columns.len(), 1);
        assert_eq!(executor.executed(), vec!["SELECT 1".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_mutation() {
        let executor = MockExecutor::new();
        let result = executor.run(&approve("DELETE FROM t")).await.unwrap();
        assert_eq!(result.rows_affected, Some(0));
        assert_eq!(executor.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_executor() {
        let executor = FailingExecutor::new("relation does not exist");
        let err = executor.run(&approve("SELECT 1")).await.unwrap_err();
        assert_eq!(err, GateError::execution("relation does not exist"));
    }
}
