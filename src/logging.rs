//! Logging setup shared by the binaries.

use tracing_subscriber::EnvFilter;

/// Initializes the logging subsystem.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
