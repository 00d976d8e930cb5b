//! Query result types.
//!
//! What the executor boundary hands back for an approved statement.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Rows produced by running a statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data.
    pub rows: Vec<Row>,

    /// Rows changed by a mutating statement, if the executor reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,

    /// Wall-clock execution time in milliseconds.
    #[serde(default)]
    pub execution_ms: u64,
}

impl QueryResult {
    /// Creates a result set with the given columns and rows.
    pub fn with_rows(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }

    /// Creates an empty result for a statement that changed `count` rows.
    pub fn affected(count: u64) -> Self {
        Self {
            rows_affected: Some(count),
            ..Self::default()
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders the result as a plain-text table.
    pub fn format_table(&self) -> String {
        if self.columns.is_empty() {
            return match self.rows_affected {
                Some(n) => format!("{n} row(s) affected ({} ms)\n", self.execution_ms),
                None => format!("OK ({} ms)\n", self.execution_ms),
            };
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Value::to_display_string).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                cells
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(col.name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |values: Vec<&str>| -> String {
            let padded: Vec<String> = values
                .iter()
                .zip(&widths)
                .map(|(value, &width)| format!("{value:<width$}"))
                .collect();
            format!("| {} |\n", padded.join(" | "))
        };
        let separator: String = format!(
            "+{}+\n",
            widths
                .iter()
                .map(|w| "-".repeat(w + 2))
                .collect::<Vec<_>>()
                .join("+")
        );

        let mut out = separator.clone();
        out.push_str(&line(self.columns.iter().map(|c| c.name.as_str()).collect()));
        out.push_str(&separator);
        for row in &cells {
            out.push_str(&line(row.iter().map(String::as_str).collect()));
        }
        out.push_str(&separator);
        out.push_str(&format!(
            "({} row(s), {} ms)\n",
            self.row_count(),
            self.execution_ms
        ));
        out
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// A single value from a database query.
///
/// Serializes untagged, so a row reaches the presentation boundary as a
/// plain JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
