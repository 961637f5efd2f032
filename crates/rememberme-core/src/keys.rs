use rememberme_const::{DEFAULT_KEY_PREFIX, EXPIRES_SUFFIX, SERIES_SUFFIX, TOKEN_SUFFIX};
use rememberme_types::{Credential, RemovalInstructions, TokenPair};

/// Store key layout for one deployment
///
/// - `{prefix}:{user_id}:series` → set of active series values
/// - `{prefix}:{user_id}:token` → set of active `series:token` composites
/// - `{prefix}:expires` → sorted set of removal instructions scored by expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn series_key(&self, user_id: &str) -> String {
        format!("{}:{user_id}:{SERIES_SUFFIX}", self.prefix)
    }

    pub fn token_key(&self, user_id: &str) -> String {
        format!("{}:{user_id}:{TOKEN_SUFFIX}", self.prefix)
    }

    pub fn expires_key(&self) -> String {
        format!("{}:{EXPIRES_SUFFIX}", self.prefix)
    }

    /// Removal instructions that forget exactly `pair` for `user_id`
    pub fn removal_for(&self, user_id: &str, pair: &TokenPair) -> RemovalInstructions {
        RemovalInstructions::new()
            .with(self.series_key(user_id), pair.series.clone())
            .with(self.token_key(user_id), pair.composite())
    }

    pub fn removal_for_credential(&self, credential: &Credential) -> RemovalInstructions {
        self.removal_for(&credential.user_id, &credential.pair())
    }
}
