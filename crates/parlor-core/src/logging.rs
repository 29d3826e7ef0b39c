//! `tracing` subscriber setup.
//!
//! Log context (connection ID, peer address) is carried on spans opened by
//! the transport and relay layers, so every event emitted while handling a
//! frame is attributed to its connection.

use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor a CLI level is given.
pub const DEFAULT_LEVEL: &str = "info";

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber with compact stderr output.
///
/// `RUST_LOG` takes precedence over `level`. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}

/// Initialize the global tracing subscriber with one JSON object per line.
///
/// Same precedence rules as [`init_subscriber`].
pub fn init_json_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .with_current_span(true);

    let _ = subscriber.try_init();
}
