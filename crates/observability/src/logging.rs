//! Tracing subscriber setup

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Directives used when `RUST_LOG` is absent; sqlx logs every statement at info
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// How events are rendered on stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// Newline-delimited JSON for collectors
    Json,
    Compact,
}

impl LogFormat {
    pub const ALL: [LogFormat; 3] = [Self::Pretty, Self::Json, Self::Compact];

    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(wanted))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
            Self::Compact => "compact",
        }
    }

    fn layer<S>(self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + 'static,
    {
        match self {
            Self::Pretty => fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            Self::Json => fmt::layer()
                .json()
                .with_current_span(true)
                .flatten_event(true)
                .boxed(),
            Self::Compact => fmt::layer().compact().with_target(false).boxed(),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("log format must be pretty, json or compact, got '{}'", s))
    }
}

/// Install the process-wide subscriber; a second call fails
///
/// Verbosity follows `RUST_LOG` (for example `feed=debug,info`).
pub fn init_logging(service_name: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    tracing_subscriber::registry()
        .with(format.layer())
        .with(filter)
        .try_init()?;

    tracing::info!(service = service_name, %format, "Logging ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ignores_case_and_padding() {
        assert_eq!(LogFormat::parse(" JSON "), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("Compact"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("xml"), None);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_every_format_parses_from_its_name() {
        for format in LogFormat::ALL {
            assert_eq!(format.to_string().parse::<LogFormat>(), Ok(format));
        }
    }

    #[test]
    fn test_default_filter_is_valid() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
