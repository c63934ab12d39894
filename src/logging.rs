//! Diagnostic logging setup.
//!
//! The library only emits `tracing` events; the binary installs the
//! subscriber once at startup. Diagnostics go to stderr so they never mix
//! with the per-file lines printed on stdout.

use std::env;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable that overrides the `-v` level, e.g. `SORTBOX_LOG=debug`.
pub const LOG_ENV: &str = "SORTBOX_LOG";

/// Filter directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "error",
        1 => "info",
        _ => "debug",
    }
}

/// Installs the global diagnostic subscriber.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logger(verbosity: u8) {
    let fallback = default_directive(verbosity);
    let directive = env::var(LOG_ENV).unwrap_or_else(|_| fallback.to_string());
    let filter_layer = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(fallback));

    let registered = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter_layer)
        .try_init();

    if registered.is_ok() {
        tracing::debug!(directive = %directive, "diagnostics enabled");
    }
}
