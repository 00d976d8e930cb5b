//! Executor boundary.
//!
//! Approved statements leave the crate through [`QueryExecutor`]. The trait
//! takes an [`ApprovedStatement`] rather than raw text, so a mutating
//! statement cannot reach an executor without passing the confirmation gate.

mod mock;
mod schema;
mod types;

pub use mock::{FailingExecutor, MockExecutor};
pub use schema::{Column, ForeignKey, Schema, Table};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use async_trait::async_trait;

use crate::error::Result;
use crate::gate::ApprovedStatement;

/// Runs approved statements against a database.
///
/// Failures are reported as [`GateError::Execution`](crate::error::GateError::Execution).
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn run(&self, statement: &ApprovedStatement) -> Result<QueryResult>;
}
