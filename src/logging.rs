//! Logging setup for hosts embedding a [crate::FitGuiSession].
//!
//! Sessions emit `tracing` events: `debug` for event classification, `info` for recomputations
//! and `warn` for rejected events. [init] installs a global formatting subscriber writing to
//! stderr, filtered by `RUST_LOG` with `info` as a fallback.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

/// Filter directive used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize tracing to write to stderr.
///
/// Subsequent calls are no-ops.
pub fn init() -> Result<(), LoggingError> {
    init_with_filter(build_env_filter())
}

/// Initialize tracing with an explicit filter, e.g. `"curve_fit_gui=debug"`
pub fn init_with_directives(directives: &str) -> Result<(), LoggingError> {
    init_with_filter(EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
}

fn init_with_filter(env_filter: EnvFilter) -> Result<(), LoggingError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }
    let stderr_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
    let subscriber = Registry::default().with(env_filter).with(stderr_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INITIALIZED.set(());
    tracing::debug!("Logging initialized");
    Ok(())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_filter_is_valid() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn repeated_init_is_noop() {
        // another test binary may have installed a subscriber already
        let first = init_with_directives("warn");
        if first.is_ok() {
            assert!(init().is_ok());
        }
    }
}
