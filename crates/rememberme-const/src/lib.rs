//! # Remember-me Constants
//!
//! Zero-dependency crate containing constants used across the remember-me
//! token service.
//!
//! This crate centralizes:
//! - Store key layout (prefix and suffixes)
//! - Token entropy
//! - Lifetime and sweep scheduling defaults

pub mod duration;
pub mod keys;
pub mod token;

pub use duration::{DEFAULT_MAX_AGE_SECONDS, DEFAULT_SWEEP_INTERVAL_SECONDS};
pub use keys::{DEFAULT_KEY_PREFIX, EXPIRES_SUFFIX, SERIES_SUFFIX, TOKEN_SUFFIX};
pub use token::{RANDOM_VALUE_BYTES, RANDOM_VALUE_HEX_LENGTH};
