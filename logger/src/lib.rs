//! Common logger configuration for the worker binary.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    filter::Targets,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};

/// Initializes a global `tracing` logger that prints to stdout.
///
/// Defaults to `INFO` and above; set `RUST_LOG` to override, e.g.
/// `RUST_LOG=worker=debug,creditscan_store=trace`.
///
/// Panics if a logger is already installed.
pub fn init() {
    try_init().expect("failed to set up logger");
}

/// Use in tests: a no-op unless `RUST_LOG` is set, and never panics if
/// another test already installed the global logger.
pub fn init_for_testing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let _ = try_init();
}

fn try_init() -> Result<(), TryInitError> {
    let targets = std::env::var("RUST_LOG")
        .ok()
        .and_then(|rust_log| Targets::from_str(&rust_log).ok())
        .unwrap_or_else(|| Targets::new().with_default(Level::INFO));

    let stdout_log = tracing_subscriber::fmt::layer()
        .compact()
        .with_level(true)
        .with_target(true)
        .with_ansi(true)
        .with_filter(targets);

    tracing_subscriber::registry().with(stdout_log).try_init()
}
