//! # Logging Setup
//!
//! Installs the `tracing` subscriber for ledger binaries. Library code only
//! emits events and never installs a subscriber itself.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,caixa=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=caixa_ledger=trace` - Show trace for the service crate only
/// - Default: [`DEFAULT_FILTER`]
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_max_level(Level::TRACE)
        .init();
}

/// Like [`init_tracing`], but leaves an already installed subscriber alone.
///
/// Returns `false` when another subscriber was installed first.
pub fn try_init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init()
        .is_ok()
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_refused() {
        let _ = try_init_tracing();
        assert!(!try_init_tracing());
    }
}
