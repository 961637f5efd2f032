//! Storage backend trait and error types.
//!
//! # Types
//!
//! - [`StorageBackend`] - Core trait for batch execution against the store
//! - [`StorageError`] - Canonical error types for storage operations
//! - [`StorageResult`] - Result type alias for storage operations

use async_trait::async_trait;
use snafu::Snafu;

use crate::command::{Batch, Replies};

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors raised by a store while executing a batch
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// The store could not be reached or dropped the connection
    #[snafu(display("Connection error: {message}"))]
    Connection { message: String },

    /// A command addressed a key holding a different kind of value
    #[snafu(display("Wrong type: key '{key}' does not hold a {expected}"))]
    WrongType { key: String, expected: &'static str },

    /// A reply did not have the shape the caller expected
    #[snafu(display("Unexpected reply at position {index}: expected {expected}"))]
    UnexpectedReply { index: usize, expected: &'static str },

    /// Any other store-side failure
    #[snafu(display("Internal storage error: {message}"))]
    Internal { message: String },
}

impl StorageError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        ConnectionSnafu { message: message.into() }.build()
    }

    /// Create a wrong type error
    pub fn wrong_type(key: impl Into<String>, expected: &'static str) -> Self {
        WrongTypeSnafu { key: key.into(), expected }.build()
    }

    /// Create an unexpected reply error
    pub fn unexpected_reply(index: usize, expected: &'static str) -> Self {
        UnexpectedReplySnafu { index, expected }.build()
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        InternalSnafu { message: message.into() }.build()
    }
}

/// A key-value store offering sets, sorted sets and atomic batches.
///
/// Implementations must apply every command of one [`Batch`] indivisibly with
/// respect to every other batch, and return one reply per command in
/// submission order. When any command fails, none of the batch takes effect.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Execute all commands of `batch` atomically.
    async fn execute(&self, batch: Batch) -> StorageResult<Replies>;

    /// Unconditionally delete `keys`, returning how many existed.
    ///
    /// Not required to be atomic with anything else.
    async fn delete(&self, keys: &[String]) -> StorageResult<i64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut batch = Batch::new();
        batch.del(keys.iter().cloned());
        self.execute(batch).await?.integer(0)
    }
}
