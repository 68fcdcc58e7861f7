//! Tracing setup.

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber: env-filtered, compact, stderr.
///
/// `filter` overrides `RUST_LOG`; with neither present, `info` is used.
/// Safe to call more than once — later calls are no-ops.
pub fn init_logging(filter: Option<&str>) {
    let env_filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
