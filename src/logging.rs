//! Tracing subscriber setup for the binary

use anyhow::anyhow;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Installs a compact stderr subscriber
///
/// `level` is the default directive; `RUST_LOG` overrides it. An unparseable
/// level falls back to `info`.
///
/// # Errors
/// Returns an error if a global subscriber is already installed
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let level: Level = level.parse().unwrap_or(Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {e}"))
}
