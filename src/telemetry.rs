//! Tracing initialization for the `bursar` binary.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber writing to stderr, so command output on stdout
/// stays machine readable. `RUST_LOG` wins over the verbosity flag.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(verbose: bool) {
    let default_level = if verbose { "bursar=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
