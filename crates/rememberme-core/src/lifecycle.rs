use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use rememberme_config::RememberMeConfig;
use rememberme_storage::{Batch, StorageBackend};
use rememberme_types::{
    Authentication, Credential, IssuedToken, TokenPair, ValidationOutcome,
    entities::{validate_user_id, validate_value},
    error::{Error, Result},
};

use crate::{
    clock::{Clock, SystemClock},
    keys::KeySpace,
    metrics,
    token::{OsTokenSource, TokenSource},
};

/// Rotating series/token pairs with replay detection
///
/// Every pair lives in three places, always written and removed together in
/// one batch:
/// - `{prefix}:{user_id}:token` holds `series:token`
/// - `{prefix}:{user_id}:series` holds `series`
/// - `{prefix}:expires` holds the pair's removal instructions, scored by expiry
///
/// A pair is single use. Validating it consumes it; the caller then asks for a
/// successor on the same series. Presenting a consumed token whose series is
/// still active means someone else already used it, which is reported as a
/// breach.
///
/// The lifecycle holds no locks. Validate and the follow-up create are two
/// separate batches; a concurrent duplicate request arriving in between sees
/// the pair already consumed and gets `Invalid`.
#[derive(Clone)]
pub struct TokenLifecycle<S: StorageBackend> {
    storage: S,
    keys: KeySpace,
    max_age: TimeDelta,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenSource>,
}

impl<S: StorageBackend> TokenLifecycle<S> {
    /// Create a lifecycle using the default key prefix, the system clock and
    /// OS randomness
    pub fn new(storage: S, max_age: Duration) -> Self {
        Self {
            storage,
            keys: KeySpace::default(),
            max_age: TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX),
            clock: Arc::new(SystemClock),
            tokens: Arc::new(OsTokenSource),
        }
    }

    /// Create a lifecycle from validated configuration
    pub fn from_config(storage: S, config: &RememberMeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(storage, config.max_age()).with_keys(KeySpace::new(config.key_prefix.clone())))
    }

    pub fn with_keys(mut self, keys: KeySpace) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Consume a presented credential
    ///
    /// The token, its series and its expiry entry are removed in one batch;
    /// what was actually present decides the outcome:
    ///
    /// | token removed | series removed | outcome |
    /// |---|---|---|
    /// | yes | yes | `Valid` |
    /// | yes | no | `Invalid` (inconsistent state, logged) |
    /// | no | no | `Invalid` |
    /// | no | yes | `Breach` |
    ///
    /// # Errors
    ///
    /// Store failures propagate and must not be treated as a breach.
    pub async fn validate(&self, credential: &Credential) -> Result<ValidationOutcome> {
        credential.validate()?;

        let batch = self.removal_batch(&credential.user_id, &credential.pair())?;
        let replies = self.storage.execute(batch).await?;
        let token_removed = replies.integer(0)? > 0;
        let series_removed = replies.integer(1)? > 0;

        let outcome = match (token_removed, series_removed) {
            (true, true) => ValidationOutcome::Valid,
            (true, false) => {
                let err = Error::inconsistent_state(format!(
                    "token of series '{}' was active without its series",
                    credential.series
                ));
                tracing::error!(
                    user_id = %credential.user_id,
                    error = %err,
                    "Inconsistent remember-me state, rejecting credential"
                );
                ValidationOutcome::Invalid
            },
            (false, false) => ValidationOutcome::Invalid,
            (false, true) => {
                tracing::warn!(
                    user_id = %credential.user_id,
                    series = %credential.series,
                    "Replayed remember-me credential detected"
                );
                ValidationOutcome::Breach
            },
        };

        metrics::record_validation(outcome);
        tracing::debug!(user_id = %credential.user_id, outcome = %outcome, "Validated credential");

        Ok(outcome)
    }

    /// Issue a new pair for `user_id`
    ///
    /// Passing `existing_series` continues that chain with a fresh token;
    /// otherwise a new series is started. The pair and its expiry entry are
    /// written in one batch.
    pub async fn create_token_pair(
        &self,
        user_id: &str,
        existing_series: Option<&str>,
    ) -> Result<IssuedToken> {
        validate_user_id(user_id)?;
        if let Some(series) = existing_series {
            validate_value("series", series)?;
        }

        let token = self.tokens.random_value()?;
        let series = match existing_series {
            Some(series) => series.to_string(),
            None => self.tokens.random_value()?,
        };
        let pair = TokenPair::new(series, token);

        let expires_at = self.expiry_from(self.clock.now());
        let member = self.keys.removal_for(user_id, &pair).to_canonical_string()?;

        let mut batch = Batch::new();
        batch
            .sadd(self.keys.token_key(user_id), pair.composite())
            .sadd(self.keys.series_key(user_id), pair.series.clone())
            .zadd(self.keys.expires_key(), expires_at.timestamp(), member);
        self.storage.execute(batch).await?;

        metrics::record_pair_created(existing_series.is_some());
        tracing::debug!(
            user_id = %user_id,
            rotated = existing_series.is_some(),
            expires_at = %expires_at,
            "Issued remember-me token pair"
        );

        Ok(IssuedToken {
            user_id: user_id.to_string(),
            series: pair.series,
            token: pair.token,
            expires_at,
        })
    }

    /// Forget one pair, e.g. on logout
    ///
    /// Runs the same removal as [`validate`](Self::validate) without
    /// interpreting what was found.
    pub async fn destroy(&self, credential: &Credential) -> Result<()> {
        credential.validate()?;

        let batch = self.removal_batch(&credential.user_id, &credential.pair())?;
        self.storage.execute(batch).await?;

        tracing::debug!(user_id = %credential.user_id, "Destroyed remember-me token pair");
        Ok(())
    }

    /// Revoke every chain of `user_id`
    ///
    /// Deletes the user's series and token sets. Expiry entries are left in
    /// place; the sweeper drops them when they come due.
    pub async fn invalidate_all(&self, user_id: &str) -> Result<()> {
        validate_user_id(user_id)?;

        let keys = [self.keys.series_key(user_id), self.keys.token_key(user_id)];
        let deleted = self.storage.delete(&keys).await?;

        metrics::record_user_invalidated();
        tracing::info!(user_id = %user_id, deleted, "Invalidated all remember-me tokens");
        Ok(())
    }

    /// Full remember-me login decision
    ///
    /// A valid credential is rotated: the successor pair on the same series is
    /// returned for the caller to hand back to the client. A breach revokes
    /// every chain of the user.
    pub async fn authenticate(&self, credential: &Credential) -> Result<Authentication> {
        match self.validate(credential).await? {
            ValidationOutcome::Valid => {
                let issued = self
                    .create_token_pair(&credential.user_id, Some(&credential.series))
                    .await?;
                Ok(Authentication::Authenticated(issued))
            },
            ValidationOutcome::Breach => {
                self.invalidate_all(&credential.user_id).await?;
                Ok(Authentication::Breach { user_id: credential.user_id.clone() })
            },
            ValidationOutcome::Invalid => Ok(Authentication::Rejected),
        }
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.max_age).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// SREM token, SREM series, ZREM expiry entry, in that order
    fn removal_batch(&self, user_id: &str, pair: &TokenPair) -> Result<Batch> {
        let member = self.keys.removal_for(user_id, pair).to_canonical_string()?;

        let mut batch = Batch::new();
        batch
            .srem(self.keys.token_key(user_id), pair.composite())
            .srem(self.keys.series_key(user_id), pair.series.clone())
            .zrem(self.keys.expires_key(), member);
        Ok(batch)
    }
}
