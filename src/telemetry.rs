use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LogLevel;

// -----------------------------------------------------------------------------
// ----- Tracing ---------------------------------------------------------------

/// Install the global fmt subscriber. `RUST_LOG` wins over `level` when set.
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(level: LogLevel) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    fmt().with_env_filter(filter).with_target(false).try_init().is_ok()
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
