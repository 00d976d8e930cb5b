//! Schema catalog boundary.
//!
//! Describes each data source to the pipeline: its schema (for the
//! generator), its identifier inventory (for the sanitizer) and its
//! connection descriptor (for dialect resolution).

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::Config;
use crate::db::Schema;
use crate::error::{GateError, Result};
use crate::sanitize::IdentifierSet;

/// Source of per-data-source metadata.
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// The schema descriptor passed to the generator.
    async fn schema(&self, data_source_id: &str) -> Result<Schema>;

    /// Table and column names known for the data source.
    async fn known_identifiers(&self, data_source_id: &str) -> Result<IdentifierSet>;

    /// The database type tag or connection URL of the data source.
    async fn dialect_of(&self, data_source_id: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    descriptor: String,
    schema: Schema,
    identifiers: IdentifierSet,
}

/// In-memory catalog, typically built from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a data source.
    pub fn with_source(
        mut self,
        id: impl Into<String>,
        descriptor: impl Into<String>,
        schema: Schema,
    ) -> Self {
        let identifiers = IdentifierSet::from_schema(&schema);
        self.entries.insert(
            id.into(),
            CatalogEntry {
                descriptor: descriptor.into(),
                schema,
                identifiers,
            },
        );
        self
    }

    /// Builds a catalog from every configured data source.
    pub fn from_config(config: &Config) -> Result<Self> {
        config
            .data_sources
            .iter()
            .try_fold(Self::new(), |catalog, (id, source)| {
                Ok(catalog.with_source(id.clone(), source.descriptor()?, source.schema()))
            })
    }

    /// Ids of all data sources, in name order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn entry(&self, id: &str) -> Result<&CatalogEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| GateError::catalog(format!("Unknown data source '{id}'")))
    }
}

#[async_trait]
impl SchemaCatalog for StaticCatalog {
    async fn schema(&self, data_source_id: &str) -> Result<Schema> {
        Ok(self.entry(data_source_id)?.schema.clone())
    }

    async fn known_identifiers(&self, data_source_id: &str) -> Result<IdentifierSet> {
        Ok(self.entry(data_source_id)?.identifiers.clone())
    }

    async fn dialect_of(&self, data_source_id: &str) -> Result<String> {
        Ok(self.entry(data_source_id)?.descriptor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Column, Table};

    fn catalog() -> StaticCatalog {
        StaticCatalog::new().with_source(
            "shop",
            "postgres://localhost/shop",
            Schema {
                tables: vec![Table::new("order-items").with_column(Column::new("unit-price", "numeric"))],
                foreign_keys: vec![],
            },
        )
    }

    #[tokio::test]
    async fn test_lookup() {
        let catalog = catalog();
        let identifiers = catalog.known_identifiers("shop").await.unwrap();
        assert!(identifiers.contains("order-items"));
        assert!(identifiers.contains("unit-price"));
        assert_eq!(catalog.dialect_of("shop").await.unwrap(), "postgres://localhost/shop");
        assert_eq!(catalog.schema("shop").await.unwrap().tables.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_source_is_catalog_error() {
        let err = catalog().schema("nope").await.unwrap_err();
        assert_eq!(err.kind(), "CatalogError");
    }

    #[test]
    fn test_from_config() {
        let config: Config = toml::from_str(
            r#"
[data_sources.a]
database_type = "sqlite"

[data_sources.b]
url = "mysql://localhost/b"
"#,
        )
        .unwrap();
        let catalog = StaticCatalog::from_config(&config).unwrap();
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(catalog.contains("b"));

        let descriptor = tokio_test::block_on(catalog.dialect_of("b")).unwrap();
        assert_eq!(descriptor, "mysql://localhost/b");
        assert!(tokio_test::block_on(catalog.known_identifiers("a"))
            .unwrap()
            .is_empty());
    }
}
