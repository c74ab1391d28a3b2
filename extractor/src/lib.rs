//! Windowed incremental QA extraction from long dialogue transcripts.
//!
//! A transcript is split into token-budgeted windows; inside each window an
//! oracle is asked repeatedly, under an iteration cap, for one typed action at
//! a time that grows a file-wide store of question/answer records.
//!
//! - **[`core`]**: Pure, deterministic logic (windowing, reply parsing, state
//!   transitions). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (config file, oracle clients,
//!   prompt templates, transcript and result files).
//!
//! [`extract`] runs the per-window loop for one file and [`batch`] drives it
//! over an input directory.

pub mod batch;
pub mod core;
pub mod exit_codes;
pub mod extract;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
