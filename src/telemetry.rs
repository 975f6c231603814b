use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{value}'")]
    Filter { value: String, source: ParseError },
    #[error("could not install log subscriber: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

/// Installs the global subscriber. Logs go to stderr so report and query
/// output on stdout can be piped.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = filter_for(config, std::env::var("RUST_LOG").ok())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(config.ansi)
        .compact()
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

/// A non-empty `RUST_LOG` beats the configured level.
fn filter_for(
    config: &TelemetryConfig,
    rust_log: Option<String>,
) -> Result<EnvFilter, TelemetryError> {
    let value = rust_log
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.log_level.clone());
    EnvFilter::try_new(&value).map_err(|source| TelemetryError::Filter { value, source })
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::filter::LevelFilter;

    use super::*;

    fn config(level: &str) -> TelemetryConfig {
        TelemetryConfig {
            log_level: level.to_string(),
            ansi: false,
        }
    }

    #[test]
    fn configured_level_builds_a_filter() {
        let filter = filter_for(&config("placement_insights=debug,warn"), None).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn rust_log_overrides_configured_level() {
        let filter = filter_for(&config("info"), Some("trace".to_string())).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));

        let filter = filter_for(&config("info"), Some("  ".to_string())).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn malformed_level_is_reported() {
        let err = filter_for(&config("placement_insights=loudest"), None).unwrap_err();
        assert!(matches!(&err, TelemetryError::Filter { value, .. } if value == "placement_insights=loudest"));
        assert!(err.to_string().contains("placement_insights=loudest"));
    }
}
