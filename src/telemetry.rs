use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

/// File name prefix for the rolling log.
pub const LOG_FILE: &str = "taskboard.log";

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered lines get flushed.
///
/// `RUST_LOG` takes precedence over `config.level`; `verbose` bumps the
/// configured level to `debug`.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) -> Result<WorkerGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_for(if verbose { "debug" } else { &config.level })?,
    };

    let (writer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };
    let to_terminal = config.directory.is_none();

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_ansi(to_terminal)
                    .with_target(false)
                    .with_writer(writer),
            )
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// Parse a filter directive such as `info` or `taskboard=debug,tower_http=warn`.
pub fn filter_for(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive).with_context(|| format!("Invalid log level '{}'", directive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_levels_and_targets() {
        assert!(filter_for("info").is_ok());
        assert!(filter_for("taskboard=debug,tower_http=warn").is_ok());
    }

    #[test]
    fn test_filter_rejects_garbage() {
        let err = filter_for("taskboard=loud").unwrap_err();
        assert!(err.to_string().contains("taskboard=loud"));
    }
}
