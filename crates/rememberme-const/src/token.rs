//! Random value sizing.

/// Bytes of OS randomness behind every series and token value.
pub const RANDOM_VALUE_BYTES: usize = 48;

/// Length of a hex-encoded series or token value.
pub const RANDOM_VALUE_HEX_LENGTH: usize = RANDOM_VALUE_BYTES * 2;
