//! The pure half of a turn: resolve the dialect, sanitize, classify.

use serde::Serialize;
use tracing::warn;

use crate::dialect;
use crate::safety::{Classification, SqlClassifier};
use crate::sanitize::{sanitize, IdentifierSet, SqlStatement};

/// A generated statement ready for the confirmation gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedStatement {
    pub statement: SqlStatement,
    pub classification: Classification,
}

/// Sanitizes SQL for the dialect named by `descriptor`.
///
/// An unresolvable descriptor is logged and the statement passes through
/// unmodified.
pub fn sanitize_for(raw_sql: &str, identifiers: &IdentifierSet, descriptor: &str) -> SqlStatement {
    let dialect = match dialect::resolve(descriptor) {
        Ok(dialect) => Some(dialect),
        Err(e) => {
            warn!(error = %e, "Skipping identifier sanitization");
            None
        }
    };
    sanitize(raw_sql, identifiers, dialect.as_ref())
}

/// Sanitizes and classifies generated SQL.
///
/// When the dialect cannot be resolved the statement is classified from its
/// raw text.
pub fn prepare(
    raw_sql: &str,
    identifiers: &IdentifierSet,
    descriptor: &str,
    classifier: &SqlClassifier,
) -> PreparedStatement {
    let statement = sanitize_for(raw_sql, identifiers, descriptor);
    let classification = classifier.classify(statement.sanitized_text());
    PreparedStatement {
        statement,
        classification,
    }
}
