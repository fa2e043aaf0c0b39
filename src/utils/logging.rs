//! Diagnostic logging setup.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::constants::ENV_LOG;

const DEFAULT_FILTER: &str = "warn";

/// Builds the filter from `TOOLRELAY_LOG`, then `RUST_LOG`, then `warn`.
pub fn env_filter() -> EnvFilter {
    filter_from(
        std::env::var(ENV_LOG).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    )
}

fn filter_from(primary: Option<String>, fallback: Option<String>) -> EnvFilter {
    primary
        .into_iter()
        .chain(fallback)
        .filter(|directives| !directives.trim().is_empty())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber, writing to stderr or appending to
/// `log_file`.
pub fn init_tracing(log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = env_filter();

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::Layer::new()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            );
            tracing::subscriber::set_global_default(subscriber)?;
            tracing::debug!(path = %path.display(), "Tracing initialized with file output");
        }
        None => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::Layer::new().with_writer(std::io::stderr));
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_directives_win_over_fallback() {
        let filter = filter_from(Some("debug".into()), Some("error".into()));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn blank_directives_fall_through() {
        let filter = filter_from(Some("  ".into()), Some("toolrelay=info".into()));
        assert_eq!(filter.to_string(), "toolrelay=info");

        let filter = filter_from(None, None);
        assert_eq!(filter.to_string(), DEFAULT_FILTER);
    }
}
