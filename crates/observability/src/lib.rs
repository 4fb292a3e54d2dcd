//! `anvilhr-observability` — process-wide tracing setup.
//!
//! Library crates in this workspace only emit `tracing` events; whoever
//! hosts them (a desktop shell, an integration test binary) calls [`init`]
//! once at startup. `RUST_LOG` overrides the built-in filter.

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Initialize process-wide observability (tracing/logging).
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}
