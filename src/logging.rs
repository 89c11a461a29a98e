//! Logging initialization.
//!
//! Logs go to stderr so stdout stays machine-readable JSON.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the default filter when `RUST_LOG` is unset.
const LOG_LEVEL_ENV: &str = "SWAGGER_AGENT_LOG_LEVEL";

/// Initialize the global subscriber.
///
/// Filter precedence: `RUST_LOG`, then `SWAGGER_AGENT_LOG_LEVEL`, then the
/// level implied by `verbosity` (0 = info, 1 = debug, 2+ = trace).
///
/// # Errors
///
/// Returns an error if the filter cannot be parsed or a subscriber is
/// already installed.
pub fn init(verbosity: u8) -> anyhow::Result<()> {
    let fallback = std::env::var(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| level_for(verbosity).to_string());

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&fallback))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()?;

    Ok(())
}

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
