use std::backtrace::Backtrace;

use rememberme_storage::StorageError;
use snafu::Snafu;

/// Result type alias for token service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the remember-me token service
///
/// All variants include backtraces for debugging. Use the constructor methods
/// (e.g., `Error::validation("message")`) to create errors. Storage failures
/// convert with `?` and keep the original [`StorageError`] as their source.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Batch execution against the store failed
    #[snafu(display("Store error: {source}"), context(false))]
    Store { source: StorageError, backtrace: Backtrace },

    /// Token present without its series, or the reverse
    #[snafu(display("Inconsistent state: {message}"))]
    InconsistentState { message: String, backtrace: Backtrace },

    /// Randomness source failure
    #[snafu(display("Token generation failed: {message}"))]
    TokenGeneration { message: String, backtrace: Backtrace },

    /// Removal instructions could not be encoded or decoded
    #[snafu(display("Serialization error: {message}"))]
    Serialization { message: String, backtrace: Backtrace },

    /// Malformed credential input
    #[snafu(display("Validation error: {message}"))]
    Validation { message: String, backtrace: Backtrace },

    /// Configuration errors
    #[snafu(display("Configuration error: {message}"))]
    Config { message: String, backtrace: Backtrace },
}

impl Error {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create an inconsistent state error
    pub fn inconsistent_state(message: impl Into<String>) -> Self {
        InconsistentStateSnafu { message: message.into() }.build()
    }

    /// Create a token generation error
    pub fn token_generation(message: impl Into<String>) -> Self {
        TokenGenerationSnafu { message: message.into() }.build()
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        SerializationSnafu { message: message.into() }.build()
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        ValidationSnafu { message: message.into() }.build()
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        ConfigSnafu { message: message.into() }.build()
    }

    // =========================================================================
    // Metadata accessors
    // =========================================================================

    /// Get error code for logs and callers
    pub fn error_code(&self) -> &str {
        match self {
            Error::Store { .. } => "STORE_ERROR",
            Error::InconsistentState { .. } => "INCONSISTENT_STATE",
            Error::TokenGeneration { .. } => "TOKEN_GENERATION_ERROR",
            Error::Serialization { .. } => "SERIALIZATION_ERROR",
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::Config { .. } => "CONFIGURATION_ERROR",
        }
    }

    /// Whether the store itself failed
    ///
    /// Callers treat this as "cannot authenticate via remember-me for this
    /// request", never as a breach.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Store { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn fails_in_store() -> Result<()> {
        Err(StorageError::connection("refused"))?;
        Ok(())
    }

    #[test]
    fn test_storage_error_converts_unchanged() {
        let err = fails_in_store().unwrap_err();
        assert!(err.is_store_error());
        assert_eq!(err.error_code(), "STORE_ERROR");
        assert_eq!(err.to_string(), "Store error: Connection error: refused");

        match err {
            Error::Store { source, .. } => {
                assert_eq!(source, StorageError::connection("refused"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_constructors_and_codes() {
        let cases = [
            (Error::inconsistent_state("x"), "INCONSISTENT_STATE"),
            (Error::token_generation("x"), "TOKEN_GENERATION_ERROR"),
            (Error::serialization("x"), "SERIALIZATION_ERROR"),
            (Error::validation("x"), "VALIDATION_ERROR"),
            (Error::config("x"), "CONFIGURATION_ERROR"),
        ];

        for (err, code) in cases {
            assert_eq!(err.error_code(), code);
            assert!(!err.is_store_error());
        }
        assert_eq!(Error::validation("empty series").to_string(), "Validation error: empty series");
    }
}
