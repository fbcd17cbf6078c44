//! Structured logging setup.
//!
//! Logs go to **stderr**; the host owns stdout. Lifecycle phases log at
//! `info`, poll iterations at `debug` and `trace`, and removals of vanished
//! databases at `warn`. Fields such as `database_id`, `engine` and
//! `resource_type` are attached as structured values.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `debug`,
//!   `linode_database_provider=debug`)
//!
//! # Examples
//!
//! ```bash
//! # Show the event and status polling of the provider
//! RUST_LOG=linode_database_provider::poller=trace ./provider
//!
//! # Debug the provider, but keep the HTTP stack quiet
//! RUST_LOG=warn,linode_database_provider=debug ./provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
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

/// Install the global subscriber at `info`, or at the level `RUST_LOG` names.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
///
/// # Example
///
/// ```ignore
/// use linode_database_provider::init_logging;
///
/// fn main() {
///     init_logging();
///     tracing::info!("Provider starting");
/// }
/// ```
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Like [`init_logging`], with `default_level` used when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to install the global subscriber at `info`.
///
/// Returns `false` when a subscriber was already set, which makes it safe to
/// call from every test.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can be set once per process, so only the
    // idempotent entry point is exercised here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("linode_database_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,linode_database_provider::poller=trace").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        try_init_logging();
        assert!(!try_init_logging());
        tracing::debug!(database_id = 1, engine = "mysql", "logging initialized");
    }
}
