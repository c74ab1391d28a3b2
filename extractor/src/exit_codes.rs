//! Stable exit codes for extractor CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid config or input, or any other fatal error.
pub const INVALID: i32 = 1;
/// `extractor run` finished but at least one file failed.
pub const PARTIAL: i32 = 2;
