//! Diagnostic tracing for the extractor binary.
//!
//! Tracing output goes to stderr and is controlled by `RUST_LOG`. It is not the
//! audit trail: every oracle round-trip is recorded in the `full_actions` of
//! the persisted result regardless of the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn,extractor=info";

/// Install the global subscriber: `RUST_LOG` filter, compact stderr output.
///
/// ```bash
/// RUST_LOG=extractor=debug extractor run
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
