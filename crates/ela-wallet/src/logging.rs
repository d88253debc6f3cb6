//! Subscriber setup for binaries embedding the wallet.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::error::WalletError;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level` when set. `format` is "json" for structured
/// output, anything else for human-readable text. Fails if a subscriber is
/// already installed.
pub fn init_logging(level: &str, format: &str) -> Result<(), WalletError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .try_init()
    };
    result.map_err(|e| WalletError::Config(format!("logging: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails() {
        let _ = init_logging("info", "text");
        assert!(matches!(init_logging("debug", "json"), Err(WalletError::Config(_))));
    }
}
