//! Logging setup and component tags.
//!
//! Every store log line carries a `component` field so operators can
//! filter on one sub-store.
//!
//! The store itself only emits events. [`init`] and [`init_with_filter`]
//! install a subscriber for the binary embedding the store, or for tests.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with govstore defaults.
///
/// Sets up tracing-subscriber with:
/// - Environment filter (RUST_LOG)
/// - Compact format suitable for terminal output
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
pub fn init_with_filter(default_filter: &str) {
    let _ = try_init(default_filter);
}

/// Like [`init_with_filter`], but reports instead of ignoring an already
/// installed subscriber. Returns `false` in that case (tests call this
/// from many threads).
pub fn try_init(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init()
        .is_ok()
}

/// Values of the `component` log field.
pub mod component {
    pub const CIRCUIT_BREAKER: &str = "circuitbreaker";
    pub const CACHE: &str = "circuitbreaker-cache";
    pub const SERVICE: &str = "service";
    pub const NAMESPACE: &str = "namespace";
    pub const AUTH: &str = "auth";
    pub const BOOTSTRAP: &str = "bootstrap";
    pub const TXN: &str = "txn";
    pub const STORE: &str = "store";
    pub const MIGRATE: &str = "migrate";
}
