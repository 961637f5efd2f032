//! # Remember-me Configuration
//!
//! CLI-first configuration for the remember-me token service. Uses
//! `clap::Parser` for argument parsing with environment variable fallbacks,
//! and `bon::Builder` for ergonomic test construction without CLI/env
//! interference. Host binaries flatten [`RememberMeConfig`] into their own
//! command line.
//!
//! ```no_run
//! use clap::Parser;
//! use rememberme_config::RememberMeConfig;
//!
//! let config = RememberMeConfig::parse();
//! config.validate().expect("invalid configuration");
//! ```
//!
//! ```no_run
//! use rememberme_config::RememberMeConfig;
//!
//! let config = RememberMeConfig::builder().max_age(86_400).sweep_interval(600).build();
//! ```

#![deny(unsafe_code)]

use std::time::Duration;

use bon::Builder;
use clap::Parser;
use rememberme_const::{
    DEFAULT_KEY_PREFIX, DEFAULT_MAX_AGE_SECONDS, DEFAULT_SWEEP_INTERVAL_SECONDS,
};
use rememberme_types::error::{Error, Result};

/// Default log level filter string.
const DEFAULT_LOG_LEVEL: &str = "info";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    /// Automatically detect: JSON for non-TTY stdout, text otherwise.
    #[default]
    Auto,
    /// JSON structured logging (recommended for production).
    Json,
    /// Human-readable text format.
    Text,
}

/// Configuration for the remember-me token service.
///
/// All fields are configurable via CLI flags or environment variables.
/// Precedence: CLI arg > env var > default value.
#[derive(Debug, Clone, Builder, Parser)]
#[command(name = "rememberme")]
#[command(version)]
#[builder(on(String, into))]
pub struct RememberMeConfig {
    // ── Tokens ───────────────────────────────────────────────────────
    /// Lifetime of a token pair in seconds.
    #[arg(long = "max-age", env = "REMEMBERME__MAX_AGE", default_value_t = DEFAULT_MAX_AGE_SECONDS)]
    #[builder(default = DEFAULT_MAX_AGE_SECONDS)]
    pub max_age: u64,

    /// Prefix for every store key written by the service.
    #[arg(long = "key-prefix", env = "REMEMBERME__KEY_PREFIX", default_value = DEFAULT_KEY_PREFIX)]
    #[builder(default = DEFAULT_KEY_PREFIX.to_string())]
    pub key_prefix: String,

    // ── Sweeper ──────────────────────────────────────────────────────
    /// Seconds between expiry sweeps.
    #[arg(
        long = "sweep-interval",
        env = "REMEMBERME__SWEEP_INTERVAL",
        default_value_t = DEFAULT_SWEEP_INTERVAL_SECONDS
    )]
    #[builder(default = DEFAULT_SWEEP_INTERVAL_SECONDS)]
    pub sweep_interval: u64,

    /// Run one sweep as soon as the sweeper starts.
    #[arg(
        long = "sweep-on-start",
        env = "REMEMBERME__SWEEP_ON_START",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    #[builder(default = true)]
    pub sweep_on_start: bool,

    // ── Logging ──────────────────────────────────────────────────────
    /// Tracing-subscriber filter string (e.g., info, debug, trace).
    #[arg(long = "log-level", env = "REMEMBERME__LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    #[builder(default = DEFAULT_LOG_LEVEL.to_string())]
    pub log_level: String,

    /// Log output format: auto, json, or text.
    #[arg(long = "log-format", env = "REMEMBERME__LOG_FORMAT", value_enum, default_value = "auto")]
    #[builder(default)]
    pub log_format: LogFormat,
}

impl Default for RememberMeConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RememberMeConfig {
    /// Validate cross-field rules.
    ///
    /// Must be called after parsing and before using the config.
    pub fn validate(&self) -> Result<()> {
        if self.max_age == 0 {
            return Err(Error::config("--max-age must be greater than 0"));
        }

        if self.sweep_interval == 0 {
            return Err(Error::config("--sweep-interval must be greater than 0"));
        }

        if self.key_prefix.is_empty() {
            return Err(Error::config("--key-prefix must not be empty"));
        }

        if self.key_prefix.contains(':') {
            return Err(Error::config("--key-prefix must not contain ':'"));
        }

        if self.max_age < self.sweep_interval {
            tracing::warn!(
                max_age = self.max_age,
                sweep_interval = self.sweep_interval,
                "--max-age is shorter than --sweep-interval; expired pairs may linger \
                 for longer than their lifetime"
            );
        }

        Ok(())
    }

    /// Lifetime of a token pair
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age)
    }

    /// Time between expiry sweeps
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // ── Default Values ───────────────────────────────────────────────

    #[test]
    fn defaults_match_expected_values() {
        let config = RememberMeConfig::builder().build();

        assert_eq!(config.max_age, 30 * 24 * 60 * 60);
        assert_eq!(config.sweep_interval, 3600);
        assert!(config.sweep_on_start);
        assert_eq!(config.key_prefix, "remme");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Auto);
        assert_eq!(config.sweep_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn default_impl_matches_builder() {
        let config = RememberMeConfig::default();
        assert_eq!(config.max_age, DEFAULT_MAX_AGE_SECONDS);
        assert_eq!(config.key_prefix, DEFAULT_KEY_PREFIX);
    }

    // ── Validation ───────────────────────────────────────────────────

    #[test]
    fn validate_passes_defaults() {
        assert!(RememberMeConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_max_age() {
        let config = RememberMeConfig::builder().max_age(0).build();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("--max-age must be greater than 0"));
    }

    #[test]
    fn validate_rejects_zero_sweep_interval() {
        let config = RememberMeConfig::builder().sweep_interval(0).build();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("--sweep-interval must be greater than 0"));
    }

    #[test]
    fn validate_rejects_bad_key_prefix() {
        let config = RememberMeConfig::builder().key_prefix("").build();
        assert!(config.validate().is_err());

        let config = RememberMeConfig::builder().key_prefix("app:remme").build();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must not contain ':'"));
    }

    #[test]
    fn validate_allows_max_age_below_interval() {
        let config = RememberMeConfig::builder().max_age(60).sweep_interval(3600).build();
        assert!(config.validate().is_ok());
    }

    // ── CLI Parsing ──────────────────────────────────────────────────

    #[test]
    fn cli_parse_durations() {
        let config = RememberMeConfig::try_parse_from([
            "test",
            "--max-age",
            "1209600",
            "--sweep-interval",
            "900",
        ])
        .unwrap();
        assert_eq!(config.max_age(), Duration::from_secs(1_209_600));
        assert_eq!(config.sweep_interval(), Duration::from_secs(900));
    }

    #[test]
    fn cli_parse_sweep_on_start_false() {
        let config = RememberMeConfig::try_parse_from(["test", "--sweep-on-start", "false"]).unwrap();
        assert!(!config.sweep_on_start);
    }

    #[test]
    fn cli_parse_key_prefix_and_logging() {
        let config = RememberMeConfig::try_parse_from([
            "test",
            "--key-prefix",
            "persist",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(config.key_prefix, "persist");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn cli_rejects_non_numeric_max_age() {
        assert!(RememberMeConfig::try_parse_from(["test", "--max-age", "forever"]).is_err());
    }

    #[test]
    fn cli_rejects_unknown_flags() {
        assert!(RememberMeConfig::try_parse_from(["test", "--storage", "redis"]).is_err());
    }

    // ── Enum Display ─────────────────────────────────────────────────

    #[test]
    fn log_format_display() {
        assert_eq!(LogFormat::Auto.to_string(), "auto");
        assert_eq!(LogFormat::Json.to_string(), "json");
        assert_eq!(LogFormat::Text.to_string(), "text");
    }
}
