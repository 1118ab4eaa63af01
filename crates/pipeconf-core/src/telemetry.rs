//! Tracing setup for pipeconf binaries.
//!
//! [`init_tracing`] installs the global subscriber once per process; later
//! calls are ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Selects JSON output when set to `json`.
pub const ENV_LOG_FORMAT: &str = "PIPECONF_LOG_FORMAT";

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. With `json`, events are written
/// as newline-delimited JSON including the current span (e.g. the reload
/// trigger).
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_target(false))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Whether [`ENV_LOG_FORMAT`] asks for JSON.
pub fn json_from_env() -> bool {
    std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing(false, Level::DEBUG);
        init_tracing(true, Level::INFO);
    }
}
