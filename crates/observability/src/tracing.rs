//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Fallback directives when `RUST_LOG` is unset: this workspace at info,
/// the chattier dependencies kept down.
const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn,hyper=warn,reqwest=warn";

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default(DEFAULT_DIRECTIVES);
}

/// Initialize with a custom fallback filter; `RUST_LOG` still wins when
/// set.
pub fn init_with_default(directives: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    // JSON logs + timestamps, configurable via RUST_LOG. Session values
    // (tokens, passwords) are kept out of events by their Debug impls;
    // nothing here needs to scrub.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
