//! Structured logging setup for hosts embedding the token service
//!
//! Library code only emits `tracing` events. These helpers install a global
//! subscriber for binaries and tests that do not bring their own.

use std::io::IsTerminal;

use rememberme_config::{LogFormat as ConfiguredFormat, RememberMeConfig};
use rememberme_types::error::{Error, Result};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Filter used when neither the config nor `RUST_LOG` provides one
const DEFAULT_FILTER: &str = "info,rememberme_core=debug";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single line with timestamp, level and fields
    Full,
    /// Multi-line with colors, for local debugging
    Pretty,
    /// Single line without timestamp details
    Compact,
    /// One JSON object per event, for log aggregation
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) { LogFormat::Full } else { LogFormat::Json }
    }
}

/// Configuration for logging behavior
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Include file/line numbers
    pub include_location: bool,
    /// Include the emitting module
    pub include_target: bool,
    pub include_thread_id: bool,
    /// Log span open/close events
    pub log_spans: bool,
    /// ANSI colors; `None` detects a terminal on stdout
    pub ansi: Option<bool>,
    /// Filter directives (e.g., "info,rememberme_core=debug"); `None` reads `RUST_LOG`
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            include_location: cfg!(debug_assertions),
            include_target: false,
            include_thread_id: false,
            log_spans: cfg!(debug_assertions),
            ansi: None,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Single-line output at `level`, JSON with target and thread fields when
    /// `json` is set
    pub fn for_level(level: &str, json: bool) -> Self {
        Self {
            format: if json { LogFormat::Json } else { LogFormat::Full },
            include_location: false,
            include_target: json,
            include_thread_id: json,
            log_spans: false,
            ansi: None,
            filter: Some(level.to_string()),
        }
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        match &self.filter {
            Some(filter) => EnvFilter::try_new(filter)
                .map_err(|e| Error::config(format!("Invalid log filter '{filter}': {e}"))),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
        }
    }

    fn layer(&self, ansi: bool) -> BoxedLayer {
        let spans = if self.log_spans { FmtSpan::NEW | FmtSpan::CLOSE } else { FmtSpan::NONE };

        match self.format {
            LogFormat::Full => fmt::layer().with_target(self.include_target).boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_ansi(ansi)
                .with_target(self.include_target)
                .with_thread_ids(self.include_thread_id)
                .with_file(self.include_location)
                .with_line_number(self.include_location)
                .with_span_events(spans)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_ansi(ansi)
                .with_target(self.include_target)
                .with_thread_ids(self.include_thread_id)
                .with_file(self.include_location)
                .with_line_number(self.include_location)
                .with_span_events(spans)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(self.include_target)
                .with_current_span(true)
                .with_span_list(true)
                .with_thread_ids(self.include_thread_id)
                .with_thread_names(self.include_thread_id)
                .boxed(),
        }
    }
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns [`Error::Config`] for an unparsable filter or when a global
/// subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use rememberme_core::logging::{LogConfig, LogFormat, init_logging};
///
/// let config = LogConfig { format: LogFormat::Pretty, ..Default::default() };
/// init_logging(config).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<()> {
    let filter = config.env_filter()?;
    let ansi = config.ansi.unwrap_or_else(|| std::io::stdout().is_terminal());

    tracing_subscriber::registry()
        .with(config.layer(ansi).with_filter(filter))
        .try_init()
        .map_err(|e| Error::config(format!("Failed to install log subscriber: {e}")))?;

    tracing::debug!(
        format = ?config.format,
        location = config.include_location,
        target = config.include_target,
        ansi,
        "Logging initialized"
    );

    Ok(())
}

/// Install the global subscriber for a level string, reporting failure on stderr
///
/// ```no_run
/// use rememberme_core::logging;
///
/// logging::init("info", true);
/// ```
pub fn init(log_level: &str, json: bool) {
    if let Err(e) = init_logging(LogConfig::for_level(log_level, json)) {
        eprintln!("Failed to initialize logging: {e}");
    }
}

/// Initialize logging from the service configuration
///
/// `auto` selects JSON when stdout is not a terminal.
pub fn init_from_config(config: &RememberMeConfig) {
    init(&config.log_level, wants_json(config.log_format, std::io::stdout().is_terminal()));
}

fn wants_json(format: ConfiguredFormat, is_terminal: bool) -> bool {
    match format {
        ConfiguredFormat::Auto => !is_terminal,
        ConfiguredFormat::Json => true,
        ConfiguredFormat::Text => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Once;

    use super::*;

    static INIT: Once = Once::new();

    fn init_test_logging() {
        INIT.call_once(|| {
            let _ = init_logging(LogConfig {
                format: LogFormat::Compact,
                log_spans: true,
                ansi: Some(false),
                filter: Some("debug".to_string()),
                ..LogConfig::for_level("debug", false)
            });
        });
    }

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::default());
        assert!(!config.include_target);
        assert!(!config.include_thread_id);
        assert!(config.ansi.is_none());
    }

    #[test]
    fn test_log_format_default() {
        #[cfg(debug_assertions)]
        assert_eq!(LogFormat::default(), LogFormat::Full);
        #[cfg(not(debug_assertions))]
        assert_eq!(LogFormat::default(), LogFormat::Json);
    }

    #[test]
    fn test_for_level() {
        let json = LogConfig::for_level("warn", true);
        assert_eq!(json.format, LogFormat::Json);
        assert!(json.include_target);
        assert_eq!(json.filter.as_deref(), Some("warn"));

        let text = LogConfig::for_level("debug", false);
        assert_eq!(text.format, LogFormat::Full);
        assert!(!text.include_thread_id);
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config =
            LogConfig { filter: Some("rememberme_core=loud".to_string()), ..LogConfig::default() };
        let err = init_logging(config).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_configured_format_selection() {
        assert!(wants_json(ConfiguredFormat::Json, true));
        assert!(!wants_json(ConfiguredFormat::Text, false));
        assert!(wants_json(ConfiguredFormat::Auto, false));
        assert!(!wants_json(ConfiguredFormat::Auto, true));
    }

    #[test]
    fn test_second_init_is_reported_not_fatal() {
        init_test_logging();
        tracing::debug!(user_id = "u1", "logging ready");

        let config = RememberMeConfig::builder().log_level("warn").build();
        init_from_config(&config);
    }
}
