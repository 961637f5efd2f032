use rand::{TryRngCore, rngs::OsRng};
use rememberme_const::RANDOM_VALUE_BYTES;
use rememberme_types::error::{Error, Result};

/// Source of the random series and token values
pub trait TokenSource: Send + Sync {
    /// Produce one fresh, unguessable value
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenGeneration`] if randomness is unavailable.
    fn random_value(&self) -> Result<String>;
}

/// 48 bytes from the operating system RNG, hex encoded
#[derive(Debug, Clone, Copy, Default)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn random_value(&self) -> Result<String> {
        let mut bytes = [0u8; RANDOM_VALUE_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::token_generation(format!("OS random source failed: {e}")))?;
        Ok(hex::encode(bytes))
    }
}
