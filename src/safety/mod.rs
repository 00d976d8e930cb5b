//! Operation classification module.
//!
//! Labels sanitized SQL as read-only or as one of a fixed set of mutating
//! operation kinds, and assigns mutating kinds a risk tier under a
//! configurable policy.

mod classifier;

pub use classifier::{classify, SqlClassifier};

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a SQL statement does to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Read,
    Insert,
    Update,
    Delete,
    Drop,
    Truncate,
    Alter,
    /// Any statement whose leading verb is not recognised.
    OtherMutation,
}

impl OperationKind {
    /// Returns true for every kind except `Read`.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Read)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
            Self::Alter => "ALTER",
            Self::OtherMutation => "OTHER_MUTATION",
        }
    }

    /// Maps a leading statement verb to its kind, ignoring case.
    pub fn from_verb(verb: &str) -> Self {
        match verb.to_ascii_uppercase().as_str() {
            "SELECT" | "WITH" => Self::Read,
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "DROP" => Self::Drop,
            "TRUNCATE" => Self::Truncate,
            "ALTER" => Self::Alter,
            _ => Self::OtherMutation,
        }
    }

    /// Intrinsic damage ordering, used to break ties between kinds of the
    /// same risk tier in multi-statement input.
    pub(crate) fn severity(&self) -> u8 {
        match self {
            Self::Read => 0,
            Self::Insert => 1,
            Self::Update => 2,
            Self::Alter => 3,
            Self::OtherMutation => 4,
            Self::Delete => 5,
            Self::Truncate => 6,
            Self::Drop => 7,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How dangerous a mutating statement is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "high")]
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Risk tiers for the policy-configurable mutating kinds.
///
/// `DELETE`, `DROP` and `TRUNCATE` are always HIGH and `READ` has no tier.
/// `ALTER` defaults to HIGH, not LOW; set `alter = "LOW"` under `[policy]`
/// to relax it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub insert: RiskTier,
    pub update: RiskTier,
    pub alter: RiskTier,
    pub other_mutation: RiskTier,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            insert: RiskTier::Low,
            update: RiskTier::Low,
            alter: RiskTier::High,
            other_mutation: RiskTier::High,
        }
    }
}

impl RiskPolicy {
    /// Returns the tier for a kind, or None for `Read`.
    pub fn tier_for(&self, kind: OperationKind) -> Option<RiskTier> {
        match kind {
            OperationKind::Read => None,
            OperationKind::Insert => Some(self.insert),
            OperationKind::Update => Some(self.update),
            OperationKind::Alter => Some(self.alter),
            OperationKind::OtherMutation => Some(self.other_mutation),
            OperationKind::Delete | OperationKind::Drop | OperationKind::Truncate => {
                Some(RiskTier::High)
            }
        }
    }
}

/// Result of classifying a SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// The most dangerous kind found in the text.
    pub kind: OperationKind,
    /// Risk tier of `kind`; None for reads.
    pub risk: Option<RiskTier>,
    /// Number of non-empty statements in the text.
    pub statement_count: usize,
    /// Optional warning for the user.
    pub warning: Option<String>,
}

impl Classification {
    /// Returns true if the statement must pass the confirmation gate.
    pub fn requires_confirmation(&self) -> bool {
        self.kind.is_mutating()
    }
}
