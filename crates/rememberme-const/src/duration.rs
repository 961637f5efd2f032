//! Lifetime and scheduling constants.

/// Default lifetime of a token pair in seconds (30 days).
///
/// Each pair's expiry index entry is scored at creation time plus this value.
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Default interval between expiry sweeps in seconds (1 hour).
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60 * 60;
