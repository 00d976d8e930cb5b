//! Schema descriptor types.
//!
//! Describes the tables of a data source for the SQL generator and is the
//! source of the identifier inventory used by the sanitizer.

use serde::{Deserialize, Serialize};

use crate::sanitize::needs_quoting;

/// The tables and relationships of one data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a table by exact name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Formats the schema for inclusion in a generation prompt.
    ///
    /// Names that need quoting are marked so the generator can quote them
    /// itself; the sanitizer covers it when it does not.
    pub fn format_for_llm(&self) -> String {
        let mut out = String::from("Database Schema:\n\n");

        for table in &self.tables {
            out.push_str(&format!("Table: {}{}\n", table.name, quoting_hint(&table.name)));
            for column in &table.columns {
                let mut notes = Vec::new();
                if table.primary_key.contains(&column.name) {
                    notes.push("PK".to_string());
                }
                if !column.is_nullable {
                    notes.push("NOT NULL".to_string());
                }
                notes.extend(
                    self.foreign_keys
                        .iter()
                        .filter(|fk| fk.from_table == table.name && fk.from_column == column.name)
                        .map(|fk| format!("FK -> {}.{}", fk.to_table, fk.to_column)),
                );

                let notes = if notes.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", notes.join(", "))
                };
                out.push_str(&format!(
                    "  - {}: {}{}{}\n",
                    column.name,
                    column.data_type,
                    notes,
                    quoting_hint(&column.name)
                ));
            }
            out.push('\n');
        }

        out
    }
}

fn quoting_hint(name: &str) -> &'static str {
    if needs_quoting(name) {
        " [quote this identifier]"
    } else {
        ""
    }
}

/// A table of a data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,

    #[serde(default)]
    pub columns: Vec<Column>,

    /// Column names that form the primary key.
    #[serde(default)]
    pub primary_key: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a column.
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,

    /// Data type (e.g., "integer", "varchar(255)").
    #[serde(default = "default_data_type", rename = "type")]
    pub data_type: String,

    #[serde(default = "default_nullable")]
    pub is_nullable: bool,
}

fn default_data_type() -> String {
    "text".to_string()
}

fn default_nullable() -> bool {
    true
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
        }
    }

    /// Sets whether the column is nullable.
    pub fn nullable(self, nullable: bool) -> Self {
        Self {
            is_nullable: nullable,
            ..self
        }
    }
}

/// A single-column foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl ForeignKey {
    pub fn new(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_column: from_column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
        }
    }
}
