#![deny(unsafe_code)]

//! # Remember-me Storage
//!
//! The store capability consumed by the token lifecycle and the expiry sweeper:
//! sets, sorted sets and atomic multi-command batches.
//!
//! - [`StorageBackend`] - trait every store implementation provides
//! - [`Batch`] / [`Command`] - ordered list of commands applied indivisibly
//! - [`Replies`] - per-command results in submission order
//! - [`MemoryBackend`] - in-process implementation

pub mod backend;
pub mod command;
pub mod memory;

pub use backend::{StorageBackend, StorageError, StorageResult};
pub use command::{Batch, Command, Replies, Reply, ScoreRange};
pub use memory::MemoryBackend;
