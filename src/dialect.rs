//! SQL dialect resolution.
//!
//! Maps a connection descriptor (a database type tag such as `postgres`, or a
//! connection URL such as `mysql://host/db`) to the quoting and keyword rules
//! used by the identifier sanitizer.

use std::fmt;

use url::Url;

use crate::error::{GateError, Result};

/// Keywords reserved by every supported dialect.
const COMMON_KEYWORDS: &[&str] = &[
    "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN", "CREATE",
    "CROSS", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END", "EXISTS", "FOREIGN",
    "FROM", "FULL", "GRANT", "GROUP", "HAVING", "IN", "INDEX", "INNER", "INSERT", "INTO", "IS",
    "JOIN", "KEY", "LEFT", "LIKE", "LIMIT", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER",
    "PRIMARY", "REFERENCES", "REVOKE", "RIGHT", "SELECT", "SET", "TABLE", "THEN", "TRUNCATE",
    "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "VIEW", "WHEN", "WHERE", "WITH",
];

const POSTGRES_KEYWORDS: &[&str] = &[
    "ANALYZE", "ARRAY", "ILIKE", "LATERAL", "ONLY", "RETURNING", "SIMILAR", "USER", "VERBOSE",
    "WINDOW",
];

const MYSQL_KEYWORDS: &[&str] = &[
    "DATABASE", "DUAL", "IGNORE", "INTERVAL", "LOCK", "REGEXP", "REPLACE", "RLIKE", "SCHEMA",
    "STRAIGHT_JOIN",
];

const SQLITE_KEYWORDS: &[&str] = &[
    "ATTACH", "AUTOINCREMENT", "DETACH", "GLOB", "PRAGMA", "REINDEX", "VACUUM",
];

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    Mysql,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the canonical type tag for this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a database type tag.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" | "redshift" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::Mysql),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the identifier quote character for this backend.
    pub fn quote_char(&self) -> char {
        match self {
            Self::Postgres | Self::Sqlite => '"',
            Self::Mysql => '`',
        }
    }

    fn extra_keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Postgres => POSTGRES_KEYWORDS,
            Self::Mysql => MYSQL_KEYWORDS,
            Self::Sqlite => SQLITE_KEYWORDS,
        }
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quoting and keyword rules for one database type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    backend: DatabaseBackend,
}

impl Dialect {
    /// Returns the dialect for a backend.
    pub fn for_backend(backend: DatabaseBackend) -> Self {
        Self { backend }
    }

    /// Returns the backend this dialect belongs to.
    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    /// Returns the identifier quote character.
    pub fn quote_char(&self) -> char {
        self.backend.quote_char()
    }

    /// Returns true if `word` is a reserved keyword (case-insensitive).
    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved_keywords()
            .any(|keyword| keyword.eq_ignore_ascii_case(word))
    }

    /// Iterates over every reserved keyword of this dialect.
    pub fn reserved_keywords(&self) -> impl Iterator<Item = &'static str> {
        COMMON_KEYWORDS
            .iter()
            .chain(self.backend.extra_keywords())
            .copied()
    }

    /// Wraps an identifier in the quote character.
    pub fn quote(&self, identifier: &str) -> String {
        let quote = self.quote_char();
        format!("{quote}{identifier}{quote}")
    }
}

/// Resolves a connection descriptor to a dialect.
///
/// The descriptor is either a bare type tag (`"postgres"`, `"MySQL"`) or a
/// connection URL whose scheme names the database type. Driver suffixes such
/// as `postgresql+asyncpg` are ignored.
pub fn resolve(descriptor: &str) -> Result<Dialect> {
    let tag = descriptor_tag(descriptor)?;
    DatabaseBackend::parse(&tag)
        .map(Dialect::for_backend)
        .ok_or_else(|| GateError::unsupported_dialect(tag))
}

fn descriptor_tag(descriptor: &str) -> Result<String> {
    let descriptor = descriptor.trim();
    if !descriptor.contains("://") {
        return Ok(descriptor.to_string());
    }

    let url = Url::parse(descriptor).map_err(|e| {
        GateError::unsupported_dialect(format!("invalid connection descriptor: {e}"))
    })?;
    let scheme = url.scheme();
    Ok(scheme.split('+').next().unwrap_or(scheme).to_string())
}
