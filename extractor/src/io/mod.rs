//! Side-effecting collaborators of the extraction engine.

pub mod config;
pub mod oracle;
pub mod process;
pub mod prompt;
pub mod result_store;
pub mod transcript;
