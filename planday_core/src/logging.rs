//! Tracing setup shared by the planday binaries.
//!
//! Call `init` once at startup. Output uses the compact fmt layer; the
//! default filter keeps things at INFO, and `RUST_LOG` overrides it with
//! the usual `EnvFilter` syntax.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging at the standard INFO default
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with an explicit default level ("debug", "info", ...).
///
/// `RUST_LOG` still wins when set.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Test-only init routing output through the test harness capture
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
