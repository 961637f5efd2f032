// Test fixtures are allowed to use unwrap/expect for clear failure messages
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Test fixtures and utilities for remember-me integration tests.
//!
//! Provides store wrappers that record or break batches, token sources that
//! fail or count, and constructors wiring a lifecycle and a sweeper to one
//! manual clock.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rememberme_storage::MemoryBackend;
//! use rememberme_test_fixtures::{RecordingBackend, test_clock, test_lifecycle};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let clock = test_clock();
//!     let storage = RecordingBackend::new(MemoryBackend::new());
//!     let lifecycle = test_lifecycle(storage.clone(), &clock);
//!
//!     let _issued = lifecycle.create_token_pair("u1", None).await.unwrap();
//!     assert_eq!(storage.command_names(), vec!["SADD", "SADD", "ZADD"]);
//! }
//! ```

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rememberme_core::{CleanupSweeper, ManualClock, TokenLifecycle, TokenSource};
use rememberme_storage::{
    Batch, Command, Replies, ScoreRange, StorageBackend, StorageError, StorageResult,
};
use rememberme_types::error::{Error, Result};

/// Unix time every test clock starts at
pub const TEST_EPOCH: i64 = 1_700_000_000;

/// Pair lifetime used by [`test_lifecycle`]
pub const TEST_MAX_AGE: Duration = Duration::from_secs(60);

/// Sweep interval used by [`test_sweeper`]
pub const TEST_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

// ============================================================================
// Store wrappers
// ============================================================================

/// Records every batch handed to the wrapped store
#[derive(Clone)]
pub struct RecordingBackend<S> {
    inner: S,
    batches: Arc<Mutex<Vec<Batch>>>,
}

impl<S: StorageBackend> RecordingBackend<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, batches: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Every batch executed so far, in order
    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().unwrap().clone()
    }

    /// Names of every command executed so far, flattened across batches
    pub fn command_names(&self) -> Vec<&'static str> {
        self.batches().iter().flat_map(|batch| batch.commands().iter().map(Command::name)).collect()
    }

    /// Keys passed to every `DEL` executed so far
    pub fn deleted_keys(&self) -> Vec<String> {
        self.batches()
            .into_iter()
            .flatten()
            .filter_map(|command| match command {
                Command::Del { keys } => Some(keys),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn clear(&self) {
        self.batches.lock().unwrap().clear();
    }
}

#[async_trait]
impl<S: StorageBackend> StorageBackend for RecordingBackend<S> {
    async fn execute(&self, batch: Batch) -> StorageResult<Replies> {
        self.batches.lock().unwrap().push(batch.clone());
        self.inner.execute(batch).await
    }
}

/// Fails batches on demand; otherwise delegates to the wrapped store
#[derive(Clone)]
pub struct FaultyBackend<S> {
    inner: S,
    failures_left: Arc<AtomicUsize>,
    skip: Arc<AtomicUsize>,
}

impl<S: StorageBackend> FaultyBackend<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failures_left: Arc::new(AtomicUsize::new(0)),
            skip: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fail the next `count` batches
    pub fn fail_next(&self, count: usize) {
        self.fail_after(0, count);
    }

    /// Let `healthy` batches through, then fail the following `count`
    pub fn fail_after(&self, healthy: usize, count: usize) {
        self.skip.store(healthy, Ordering::SeqCst);
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.failures_left.store(0, Ordering::SeqCst);
        self.skip.store(0, Ordering::SeqCst);
    }

    fn should_fail(&self) -> bool {
        if self.failures_left.load(Ordering::SeqCst) == 0 {
            return false;
        }
        if self.skip.load(Ordering::SeqCst) > 0 {
            self.skip.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        self.failures_left.fetch_sub(1, Ordering::SeqCst);
        true
    }
}

#[async_trait]
impl<S: StorageBackend> StorageBackend for FaultyBackend<S> {
    async fn execute(&self, batch: Batch) -> StorageResult<Replies> {
        if self.should_fail() {
            return Err(StorageError::connection("injected failure"));
        }
        self.inner.execute(batch).await
    }
}

// ============================================================================
// Token sources
// ============================================================================

/// Token source whose randomness is always unavailable
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingTokenSource;

impl TokenSource for FailingTokenSource {
    fn random_value(&self) -> Result<String> {
        Err(Error::token_generation("entropy source unavailable"))
    }
}

/// Predictable values `v0001`, `v0002`, ...
#[derive(Debug, Clone, Default)]
pub struct SequentialTokenSource {
    next: Arc<AtomicUsize>,
}

impl TokenSource for SequentialTokenSource {
    fn random_value(&self) -> Result<String> {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("v{n:04}"))
    }
}

// ============================================================================
// Constructors
// ============================================================================

/// Manual clock at [`TEST_EPOCH`]
pub fn test_clock() -> ManualClock {
    ManualClock::at_unix(TEST_EPOCH)
}

/// Lifecycle with [`TEST_MAX_AGE`] driven by `clock`
pub fn test_lifecycle<S: StorageBackend>(storage: S, clock: &ManualClock) -> TokenLifecycle<S> {
    TokenLifecycle::new(storage, TEST_MAX_AGE).with_clock(Arc::new(clock.clone()))
}

/// Sweeper with [`TEST_SWEEP_INTERVAL`] driven by `clock`
pub fn test_sweeper<S: StorageBackend + Clone + 'static>(
    storage: S,
    clock: &ManualClock,
) -> CleanupSweeper<S> {
    CleanupSweeper::new(storage, TEST_SWEEP_INTERVAL).with_clock(Arc::new(clock.clone()))
}

// ============================================================================
// Store inspection
// ============================================================================

/// Members of the set at `key`, sorted; empty when the key is absent
pub async fn set_members<S: StorageBackend>(storage: &S, key: &str) -> Vec<String> {
    let mut batch = Batch::new();
    batch.smembers(key);
    storage.execute(batch).await.unwrap().members(0).unwrap().to_vec()
}

/// Every member of the sorted set at `key`, by score
pub async fn index_members<S: StorageBackend>(storage: &S, key: &str) -> Vec<String> {
    let mut batch = Batch::new();
    batch.zrange_by_score(key, ScoreRange::all());
    storage.execute(batch).await.unwrap().members(0).unwrap().to_vec()
}

pub async fn key_exists<S: StorageBackend>(storage: &S, key: &str) -> bool {
    let mut batch = Batch::new();
    batch.exists(key);
    storage.execute(batch).await.unwrap().integer(0).unwrap() == 1
}
