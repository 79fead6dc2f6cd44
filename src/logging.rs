//! Diagnostic logging for devstart itself, on stderr.
//!
//! User-facing output goes through [`crate::ui::StartupUI`] on stdout. This is
//! for debugging the launcher: `DEVSTART_LOG=debug devstart`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "DEVSTART_LOG";

/// Install the global subscriber. `verbose` raises the default level to debug;
/// `DEVSTART_LOG` overrides both.
pub fn init(verbose: bool) {
    let default_level = if verbose { "devstart=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
