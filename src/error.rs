//! Error types for querygate.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for querygate operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The database type tag is not one of the known dialects.
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// A mutating statement arrived while another one awaits a decision.
    #[error("A confirmation is already pending for this session")]
    ConfirmationAlreadyPending,

    /// Confirm or cancel arrived while the gate was idle.
    #[error("No confirmation is pending")]
    NoPendingConfirmation,

    /// The decision named a request other than the outstanding one.
    #[error("Decision does not match the pending confirmation request")]
    ConfirmationMismatch,

    /// The pending request outlived the confirmation timeout.
    #[error("The confirmation request expired and was cancelled")]
    ConfirmationExpired,

    /// A turn is already in flight for this session.
    #[error("Session is busy with another request")]
    SessionBusy,

    /// The SQL generator failed (API errors, timeouts, malformed output).
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The executor rejected or failed the statement.
    #[error("Execution error: {0}")]
    Execution(String),

    /// The schema catalog could not describe the data source.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (closed channels, unexpected states).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Creates an unsupported-dialect error for the given type tag.
    pub fn unsupported_dialect(tag: impl Into<String>) -> Self {
        Self::UnsupportedDialect(tag.into())
    }

    /// Creates a generation error with the given message.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a catalog error with the given message.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the stable error kind reported in turn events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedDialect(_) => "UnsupportedDialect",
            Self::ConfirmationAlreadyPending => "ConfirmationAlreadyPending",
            Self::NoPendingConfirmation => "NoPendingConfirmation",
            Self::ConfirmationMismatch => "ConfirmationMismatch",
            Self::ConfirmationExpired => "ConfirmationExpired",
            Self::SessionBusy => "SessionBusy",
            Self::Generation(_) => "GenerationFailure",
            Self::Execution(_) => "ExecutionError",
            Self::Catalog(_) => "CatalogError",
            Self::Config(_) => "ConfigError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnsupportedDialect(_) => "Dialect Error",
            Self::ConfirmationAlreadyPending
            | Self::NoPendingConfirmation
            | Self::ConfirmationMismatch
            | Self::ConfirmationExpired => "Confirmation Error",
            Self::SessionBusy => "Session Error",
            Self::Generation(_) => "Generation Error",
            Self::Execution(_) => "Execution Error",
            Self::Catalog(_) => "Catalog Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using GateError.
pub type Result<T> = std::result::Result<T, GateError>;
