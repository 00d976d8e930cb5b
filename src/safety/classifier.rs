//! SQL classification logic.
//!
//! Classifies by the leading verb of each statement. `WITH` statements are
//! parsed with sqlparser-rs so that data-modifying CTEs are not mistaken for
//! reads; text sqlparser rejects falls back to a keyword scan.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::sanitize::scanner::{next_code, split_statements, tokenize, TokenKind};

use super::{Classification, OperationKind, RiskPolicy, RiskTier};

/// Words that make a `WITH` statement write data.
const DATA_MODIFYING_VERBS: &[&str] = &["INSERT", "UPDATE", "DELETE", "MERGE"];

/// Classifies SQL under a risk policy.
#[derive(Debug, Clone, Default)]
pub struct SqlClassifier {
    policy: RiskPolicy,
}

impl SqlClassifier {
    /// Creates a classifier with the given policy.
    pub fn new(policy: RiskPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// Classifies a SQL text.
    ///
    /// With several statements the most dangerous one decides: a higher
    /// risk tier wins, and within a tier the more destructive kind. Text
    /// with no statement at all is OTHER_MUTATION.
    pub fn classify(&self, sql: &str) -> Classification {
        let kinds = statement_kinds(sql);
        let statement_count = kinds.len();

        let kind = kinds
            .into_iter()
            .max_by_key(|kind| (self.policy.tier_for(*kind), kind.severity()))
            .unwrap_or(OperationKind::OtherMutation);
        let risk = self.policy.tier_for(kind);

        let warning = if statement_count == 0 {
            Some("No SQL statement found. Please review carefully.".to_string())
        } else if statement_count > 1 && kind.is_mutating() {
            Some(format!(
                "Contains {statement_count} statements; all of them run on confirmation."
            ))
        } else if risk == Some(RiskTier::High) {
            Some("This action cannot be undone.".to_string())
        } else {
            None
        };

        debug!(%kind, ?risk, statement_count, "Classified SQL");
        Classification {
            kind,
            risk,
            statement_count,
            warning,
        }
    }
}

/// Classifies SQL under the default policy and returns its operation kind.
pub fn classify(sql: &str) -> OperationKind {
    SqlClassifier::default().classify(sql).kind
}

/// Returns the kind of every statement that contains code.
fn statement_kinds(sql: &str) -> Vec<OperationKind> {
    split_statements(sql)
        .into_iter()
        .filter_map(classify_statement)
        .collect()
}

/// Classifies one statement by its leading verb; None if it holds no code.
fn classify_statement(statement: &str) -> Option<OperationKind> {
    let tokens = tokenize(statement);
    let mut idx = next_code(&tokens, 0)?;
    while tokens[idx].is_punct(statement, '(') {
        match next_code(&tokens, idx + 1) {
            Some(next) => idx = next,
            None => return Some(OperationKind::OtherMutation),
        }
    }

    let leading = tokens[idx];
    if leading.kind != TokenKind::Word {
        return Some(OperationKind::OtherMutation);
    }

    let verb = leading.text(statement);
    let kind = OperationKind::from_verb(verb);
    if verb.eq_ignore_ascii_case("WITH") {
        return Some(cte_mutation(statement).unwrap_or(kind));
    }
    Some(kind)
}

/// Returns the most dangerous data-modifying kind inside a `WITH` statement.
fn cte_mutation(statement: &str) -> Option<OperationKind> {
    match Parser::parse_sql(&GenericDialect {}, statement) {
        Ok(parsed) => parsed.iter().filter_map(statement_mutation).max_by_key(|k| k.severity()),
        Err(e) => {
            debug!(error = %e, "WITH statement not parseable, scanning keywords");
            keyword_mutation(statement)
        }
    }
}

/// Scans code tokens for data-modifying verbs.
fn keyword_mutation(statement: &str) -> Option<OperationKind> {
    tokenize(statement)
        .into_iter()
        .filter(|t| t.kind == TokenKind::Word)
        .filter_map(|t| {
            let word = t.text(statement);
            DATA_MODIFYING_VERBS
                .iter()
                .find(|verb| word.eq_ignore_ascii_case(verb))
                .map(|verb| match *verb {
                    "MERGE" => OperationKind::OtherMutation,
                    verb => OperationKind::from_verb(verb),
                })
        })
        .max_by_key(|k| k.severity())
}

fn statement_mutation(statement: &Statement) -> Option<OperationKind> {
    match statement {
        Statement::Query(query) => query_mutation(query),
        Statement::Insert(_) => Some(OperationKind::Insert),
        Statement::Update { .. } => Some(OperationKind::Update),
        Statement::Delete(_) => Some(OperationKind::Delete),
        Statement::Merge { .. } => Some(OperationKind::OtherMutation),
        _ => None,
    }
}

fn query_mutation(query: &Query) -> Option<OperationKind> {
    let ctes = query
        .with
        .iter()
        .flat_map(|with| with.cte_tables.iter())
        .filter_map(|cte| query_mutation(&cte.query));

    ctes.chain(set_expr_mutation(&query.body))
        .max_by_key(|k| k.severity())
}

fn set_expr_mutation(set_expr: &SetExpr) -> Option<OperationKind> {
    match set_expr {
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => statement_mutation(stmt),
        SetExpr::Query(query) => query_mutation(query),
        SetExpr::Select(select) => select_mutation(select),
        SetExpr::SetOperation { left, right, .. } => set_expr_mutation(left)
            .into_iter()
            .chain(set_expr_mutation(right))
            .max_by_key(|k| k.severity()),
        other => keyword_mutation(&other.to_string()),
    }
}

fn select_mutation(select: &Select) -> Option<OperationKind> {
    select
        .from
        .iter()
        .filter_map(table_with_joins_mutation)
        .max_by_key(|k| k.severity())
}

fn table_with_joins_mutation(twj: &TableWithJoins) -> Option<OperationKind> {
    std::iter::once(&twj.relation)
        .chain(twj.joins.iter().map(|join| &join.relation))
        .filter_map(table_factor_mutation)
        .max_by_key(|k| k.severity())
}

fn table_factor_mutation(factor: &TableFactor) -> Option<OperationKind> {
    match factor {
        TableFactor::Derived { subquery, .. } => query_mutation(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => table_with_joins_mutation(table_with_joins),
        _ => None,
    }
}
