//! Store key layout.
//!
//! ```text
//! {prefix}:{user_id}:series   set of active series values
//! {prefix}:{user_id}:token    set of active "series:token" composites
//! {prefix}:expires            sorted set of removal instructions by expiry
//! ```

/// Default prefix for every key written by the service.
pub const DEFAULT_KEY_PREFIX: &str = "remme";

/// Suffix of the per-user series set key.
pub const SERIES_SUFFIX: &str = "series";

/// Suffix of the per-user token set key.
pub const TOKEN_SUFFIX: &str = "token";

/// Suffix of the global expiry index key.
pub const EXPIRES_SUFFIX: &str = "expires";
