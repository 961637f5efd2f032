use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator between series and token in the composite token-set member
pub const COMPOSITE_SEPARATOR: char = ':';

/// A series/token combination identifying one credential instance
///
/// The series survives rotation; the token is single use.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPair {
    pub series: String,
    pub token: String,
}

impl TokenPair {
    pub fn new(series: impl Into<String>, token: impl Into<String>) -> Self {
        Self { series: series.into(), token: token.into() }
    }

    /// The `series:token` member stored in the user's token set
    pub fn composite(&self) -> String {
        format!("{}{COMPOSITE_SEPARATOR}{}", self.series, self.token)
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("series", &self.series)
            .field("token", &"[redacted]")
            .finish()
    }
}

/// The decoded, signature-verified `{userid, series, token}` triple a client
/// presents for remember-me authentication
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "userid")]
    pub user_id: String,
    pub series: String,
    pub token: String,
}

impl Credential {
    /// Create a credential, rejecting empty components and separators that
    /// would make the composite `series:token` member ambiguous
    pub fn new(
        user_id: impl Into<String>,
        series: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        let credential = Self { user_id: user_id.into(), series: series.into(), token: token.into() };
        credential.validate()?;
        Ok(credential)
    }

    /// Check that every component is present and well formed
    ///
    /// Needed for credentials that arrive through deserialization rather than
    /// [`Credential::new`].
    pub fn validate(&self) -> Result<()> {
        validate_user_id(&self.user_id)?;
        validate_value("series", &self.series)?;
        validate_value("token", &self.token)
    }

    pub fn pair(&self) -> TokenPair {
        TokenPair::new(self.series.clone(), self.token.clone())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("series", &self.series)
            .field("token", &"[redacted]")
            .finish()
    }
}

/// Validates a user identifier before it becomes part of a store key
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        return Err(Error::validation("user id must not be empty"));
    }
    Ok(())
}

/// Validates a series or token value
pub fn validate_value(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(format!("{name} must not be empty")));
    }
    if value.contains(COMPOSITE_SEPARATOR) {
        return Err(Error::validation(format!(
            "{name} must not contain '{COMPOSITE_SEPARATOR}'"
        )));
    }
    Ok(())
}
