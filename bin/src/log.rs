//! Logging initialization for the daybook CLI.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initializes tracing output on stderr.
///
/// The default level comes from the `-v` count; `RUST_LOG` overrides it
/// when set.
pub(crate) fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
