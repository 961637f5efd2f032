//! # Remember-me Core
//!
//! Persistent-login tokens with replay detection.
//!
//! - [`TokenLifecycle`] validates, issues, rotates and revokes series/token pairs
//! - [`CleanupSweeper`] periodically reclaims expired pairs through the expiry index
//! - [`Clock`] and [`TokenSource`] are the injectable time and randomness seams
//!
//! Cookie encoding and signing belong to the host; this crate only sees the
//! decoded [`Credential`](rememberme_types::Credential).

#![deny(unsafe_code)]

pub mod clock;
pub mod keys;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod sweeper;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use keys::KeySpace;
pub use lifecycle::TokenLifecycle;
pub use sweeper::{CleanupSweeper, SweepErrorHandler, SweepEvent, SweepReport};
pub use token::{OsTokenSource, TokenSource};
