//! End-to-end tests of the public API.

pub mod classify_test;
pub mod gate_test;
pub mod sanitize_test;
pub mod session_test;
