//! Logging setup for the provider process.
//!
//! All logs go to **stderr**; stdout belongs to the host.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard `tracing` filter (e.g. `info`, `tfe_provider=debug`)
//! - `TFE_LOG`: used when `RUST_LOG` is unset, so operators can turn on
//!   provider logs without touching the host's own filter
//!
//! ```bash
//! TFE_LOG=debug ./tfe-provider
//! RUST_LOG=warn,tfe_provider::resources=debug ./tfe-provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Fallback filter variable consulted after `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "TFE_LOG";

/// Initialize the global subscriber with an `info` default.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize the global subscriber, using `default_level` when neither
/// `RUST_LOG` nor `TFE_LOG` is set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if a subscriber already exists.
///
/// Useful in tests, where several cases may race to install one.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV_VAR))
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // filter parsing is covered here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("tfe_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,tfe_provider::resources=trace").is_ok());
    }

    #[test]
    fn test_try_init_is_repeatable() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
