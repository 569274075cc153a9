//! Logging setup for the binary. The library only emits `tracing` events.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Variable holding a `tracing` filter directive that overrides the defaults.
pub const LOG_ENV: &str = "HOIST_LOG";

/// Installs a stderr subscriber: `info` for hoist by default, `debug` with `--debug`.
pub fn init(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new("warn").add_directive(
            format!("hoist={level}")
                .parse()
                .unwrap_or_else(|_| level.into()),
        )
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
