//! Tracing setup for the CLI.
//!
//! Diagnostics go to stderr and are gated by `RUST_LOG` (default `warn`),
//! e.g. `RUST_LOG=looper=debug looper run`. Product artifacts, such as the
//! per-iteration files under `.looper/iterations/`, are written
//! unconditionally and do not depend on the log level.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber. Call once, at process start.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
