//! Tracing subscriber setup shared by the binaries.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

/// Install the global subscriber with the given level and output format.
///
/// `RUST_LOG` takes precedence over `level` when set. Pass `format = "json"`
/// for structured JSON lines; anything else prints human-readable text.
/// Fails if a global subscriber is already installed.
pub fn init_logging(level: &str, format: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let _ = init_logging("warn", "text");
        assert!(init_logging("warn", "json").is_err());
    }
}
