//! Deterministic, pure logic of the extraction engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod action;
pub mod parser;
pub mod qa_store;
pub mod state_update;
pub mod tokens;
pub mod types;
pub mod window;
