//! Tracing subscriber bootstrap shared by the SAV binaries

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Parse a configured log level, falling back to INFO for unknown values
pub fn parse_level(level: &str) -> Level {
    level.trim().parse().unwrap_or(Level::INFO)
}

/// Build the log filter
///
/// A valid `RUST_LOG` replaces the configured level entirely; the
/// configured level applies only when `RUST_LOG` is unset or invalid.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(parse_level(level).into()))
}

/// Install the global fmt subscriber
pub fn init_tracing(level: &str) {
    // A subscriber may already be installed (e.g. by a test harness)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .try_init();
}
