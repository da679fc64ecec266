//! Tracing subscriber setup shared by every codeshare binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence. Otherwise `default_level` applies to the
/// calling binary and the codeshare crates, while dependencies stay at `warn`.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn setup_logger(bin_name: &str, default_level: &str) {
    let crate_name = bin_name.replace('-', "_");
    let default_directives = format!(
        "warn,{crate_name}={default_level},codeshare_server={default_level},codeshare_shared={default_level},tower_http={default_level}"
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
