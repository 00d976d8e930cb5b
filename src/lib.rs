//! querygate - identifier sanitization, operation classification and
//! confirmation-gated execution for LLM-generated SQL.
//!
//! This library exposes the core modules for the binary and integration tests.

pub mod catalog;
pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod gate;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod safety;
pub mod sanitize;
pub mod session;
