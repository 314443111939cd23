//! Structured logging.

use crate::config::{LoggingSettings, vars};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter when neither `ARCHON_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Level filter.
    pub filter: EnvFilter,
    /// Log file; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Resolves settings, letting `ARCHON_LOG` then `RUST_LOG` override the
    /// configured filter.
    ///
    /// `verbose` raises the crate's own level to `debug`.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let format = settings
            .format
            .as_deref()
            .and_then(|f| {
                let parsed = LogFormat::parse(f);
                if parsed.is_none() {
                    tracing::warn!(format = f, "Unknown log format, using pretty");
                }
                parsed
            })
            .unwrap_or_default();

        let directives = std::env::var(vars::LOG)
            .ok()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .or_else(|| settings.filter.clone())
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());

        Self {
            format,
            filter: build_filter(&directives, verbose),
            file: settings.file.clone(),
        }
    }
}

/// Builds an [`EnvFilter`], falling back to [`DEFAULT_FILTER`] on bad input.
fn build_filter(directives: &str, verbose: bool) -> EnvFilter {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if verbose {
        match "archon_dal=debug".parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        }
    } else {
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("json" => Some(LogFormat::Json))]
    #[test_case("Pretty" => Some(LogFormat::Pretty))]
    #[test_case("text" => Some(LogFormat::Pretty))]
    #[test_case("xml" => None)]
    fn test_parse_format(s: &str) -> Option<LogFormat> {
        LogFormat::parse(s)
    }

    #[test]
    fn test_from_settings_keeps_file_and_format() {
        let settings = LoggingSettings {
            format: Some("json".to_string()),
            filter: None,
            file: Some(PathBuf::from("/tmp/archon.log")),
        };
        let config = LoggingConfig::from_settings(&settings, false);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/archon.log")));
    }

    #[test]
    fn test_bad_directives_fall_back() {
        let filter = build_filter("=[[", true);
        assert!(filter.to_string().contains("archon_dal=debug"));
    }
}
