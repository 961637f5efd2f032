use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use rememberme_config::RememberMeConfig;
use rememberme_storage::{Batch, ScoreRange, StorageBackend};
use rememberme_types::{
    RemovalInstructions,
    error::{Error, Result},
};
use tokio::{
    sync::{Mutex, broadcast, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    clock::{Clock, SystemClock},
    keys::KeySpace,
    metrics,
};

/// Capacity of the sweep event channel; slow subscribers lag rather than block
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Callback receiving each failed sweep cycle's error
pub type SweepErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Lifecycle notifications of the sweeper
#[derive(Debug, Clone, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum SweepEvent {
    #[strum(serialize = "sweep-started")]
    Started { at: DateTime<Utc> },
    /// Only emitted when the cycle succeeded
    #[strum(serialize = "sweep-finished")]
    Finished(SweepReport),
}

/// What one successful sweep cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries scored at or below this unix time were due
    pub cutoff: i64,
    /// Expiry index entries taken out of the index
    pub expired: usize,
    /// Entries that could not be decoded and were dropped
    pub malformed: usize,
    /// Set members actually removed
    pub values_removed: usize,
    /// Set keys found empty and deleted
    pub keys_deleted: usize,
}

/// One sweep cycle's collaborators, shared with the scheduled task
#[derive(Clone)]
struct Sweep<S> {
    storage: S,
    keys: KeySpace,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<SweepEvent>,
    error_handler: Option<SweepErrorHandler>,
    cycle: Arc<Mutex<()>>,
}

impl<S: StorageBackend> Sweep<S> {
    async fn run(&self) -> Result<SweepReport> {
        let _cycle = self.cycle.lock().await;

        // No subscribers is fine
        let _ = self.events.send(SweepEvent::Started { at: self.clock.now() });
        let started = Instant::now();

        match self.sweep().await {
            Ok(report) => {
                let elapsed = started.elapsed().as_secs_f64();
                metrics::record_sweep_success(report.expired, report.keys_deleted, elapsed);
                tracing::debug!(
                    cutoff = report.cutoff,
                    expired = report.expired,
                    malformed = report.malformed,
                    values_removed = report.values_removed,
                    keys_deleted = report.keys_deleted,
                    "Sweep finished"
                );
                let _ = self.events.send(SweepEvent::Finished(report.clone()));
                Ok(report)
            },
            Err(err) => {
                metrics::record_sweep_failure(started.elapsed().as_secs_f64());
                match &self.error_handler {
                    Some(handler) => handler(&err),
                    None => tracing::error!(error = %err, code = err.error_code(), "Sweep failed"),
                }
                Err(err)
            },
        }
    }

    async fn sweep(&self) -> Result<SweepReport> {
        let cutoff = self.clock.unix_seconds();
        let index_key = self.keys.expires_key();

        // Take every due entry out of the index in one step
        let mut batch = Batch::new();
        batch
            .zrange_by_score(index_key.clone(), ScoreRange::up_to(cutoff))
            .zrem_range_by_score(index_key, ScoreRange::up_to(cutoff));
        let replies = self.storage.execute(batch).await?;
        let due = replies.members(0)?;

        let mut report = SweepReport { cutoff, expired: due.len(), ..SweepReport::default() };
        let mut pending: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for member in due {
            match RemovalInstructions::parse(member) {
                Ok(removal) => {
                    for (key, value) in removal.iter() {
                        pending.entry(key.to_string()).or_default().insert(value.to_string());
                    }
                },
                Err(err) => {
                    report.malformed += 1;
                    tracing::warn!(error = %err, "Dropping malformed expiry index entry");
                },
            }
        }

        if pending.is_empty() {
            return Ok(report);
        }

        let mut batch = Batch::new();
        for (key, values) in &pending {
            for value in values {
                batch.srem(key.clone(), value.clone());
            }
        }
        for key in pending.keys() {
            batch.scard(key.clone());
        }
        let replies = self.storage.execute(batch).await?;

        // SCARD replies follow the SREM replies
        let offset = replies.len().checked_sub(pending.len()).ok_or_else(|| {
            Error::inconsistent_state("store returned fewer replies than commands")
        })?;
        for index in 0..offset {
            report.values_removed += usize::try_from(replies.integer(index)?).unwrap_or(0);
        }
        let mut emptied = Vec::new();
        for (position, key) in pending.keys().enumerate() {
            if replies.integer(offset + position)? == 0 {
                emptied.push(key.clone());
            }
        }

        if !emptied.is_empty() {
            let mut batch = Batch::new();
            batch.del(&emptied);
            self.storage.execute(batch).await?;
            report.keys_deleted = emptied.len();
        }

        Ok(report)
    }
}

/// Periodic reclamation of expired token pairs
///
/// Each cycle takes every due entry out of the expiry index, strips the
/// values it names from their sets, and deletes the sets left empty. Three
/// batches are used:
///
/// 1. `ZRANGEBYSCORE` + `ZREMRANGEBYSCORE` on the index up to now
/// 2. one `SREM` per removal, then one `SCARD` per touched set
/// 3. `DEL` of every set whose count dropped to 0, skipped when there is none
///
/// A failed cycle is reported once to the error handler (or logged when none
/// is registered) and the schedule carries on. Cycles never overlap.
///
/// # Usage
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use rememberme_core::CleanupSweeper;
/// use rememberme_storage::MemoryBackend;
///
/// # async fn example() {
/// let sweeper = CleanupSweeper::new(MemoryBackend::new(), Duration::from_secs(3600));
/// let mut events = sweeper.subscribe();
///
/// sweeper.start().await;
/// let _started = events.recv().await;
///
/// sweeper.stop().await;
/// # }
/// ```
pub struct CleanupSweeper<S: StorageBackend> {
    sweep: Sweep<S>,
    interval: Duration,
    sweep_on_start: bool,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: StorageBackend + Clone + 'static> CleanupSweeper<S> {
    /// Create a sweeper using the default key prefix and the system clock
    ///
    /// Sweeps once immediately on [`start`](Self::start) and then every
    /// `interval`.
    pub fn new(storage: S, interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown, _) = watch::channel(false);
        Self {
            sweep: Sweep {
                storage,
                keys: KeySpace::default(),
                clock: Arc::new(SystemClock),
                events,
                error_handler: None,
                cycle: Arc::new(Mutex::new(())),
            },
            interval,
            sweep_on_start: true,
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Create a sweeper from validated configuration
    pub fn from_config(storage: S, config: &RememberMeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(storage, config.sweep_interval())
            .with_keys(KeySpace::new(config.key_prefix.clone()))
            .with_sweep_on_start(config.sweep_on_start))
    }

    pub fn with_keys(mut self, keys: KeySpace) -> Self {
        self.sweep.keys = keys;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.sweep.clock = clock;
        self
    }

    pub fn with_sweep_on_start(mut self, sweep_on_start: bool) -> Self {
        self.sweep_on_start = sweep_on_start;
        self
    }

    /// Register the callback for failed cycles
    ///
    /// Without one, failures are logged at error level.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.sweep.error_handler = Some(Arc::new(handler));
        self
    }

    /// Receive `sweep-started` / `sweep-finished` notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SweepEvent> {
        self.sweep.events.subscribe()
    }

    /// Run one cycle now
    ///
    /// Waits for a scheduled cycle in progress to finish first.
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        self.sweep.run().await
    }

    pub async fn is_running(&self) -> bool {
        self.handle.lock().await.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Start the periodic schedule
    ///
    /// Does nothing if already started or if the interval is zero.
    pub async fn start(&self) {
        if self.interval.is_zero() {
            tracing::error!("Sweep interval must be greater than zero, sweeper not started");
            return;
        }

        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            tracing::debug!("Sweeper already running");
            return;
        }

        self.shutdown.send_replace(false);
        let mut shutdown = self.shutdown.subscribe();
        let sweep = self.sweep.clone();
        let period = self.interval;
        let first_tick =
            if self.sweep_on_start { Instant::now() } else { Instant::now() + period };

        *handle = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = interval.tick() => {
                        // Failures are already reported inside the cycle
                        let _ = sweep.run().await;
                    },
                }
            }

            tracing::debug!("Sweeper task stopped");
        }));

        tracing::info!(interval_secs = period.as_secs(), "Sweeper started");
    }

    /// Stop the schedule
    ///
    /// A cycle in progress is allowed to finish; this waits for it.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);

        let Some(handle) = self.handle.lock().await.take() else {
            return;
        };
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Sweeper task ended abnormally");
        }

        tracing::info!("Sweeper stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rememberme_storage::{MemoryBackend, StorageError};
    use rememberme_types::ValidationOutcome;

    use super::*;
    use crate::{clock::ManualClock, lifecycle::TokenLifecycle};

    fn setup() -> (TokenLifecycle<MemoryBackend>, CleanupSweeper<MemoryBackend>, ManualClock) {
        let storage = MemoryBackend::new();
        let clock = ManualClock::at_unix(1_700_000_000);
        let lifecycle = TokenLifecycle::new(storage.clone(), Duration::from_secs(60))
            .with_clock(Arc::new(clock.clone()));
        let sweeper = CleanupSweeper::new(storage, Duration::from_secs(3600))
            .with_clock(Arc::new(clock.clone()));
        (lifecycle, sweeper, clock)
    }

    #[tokio::test]
    async fn test_sweep_leaves_live_pairs() {
        let (lifecycle, sweeper, _) = setup();
        let credential = lifecycle.create_token_pair("u1", None).await.unwrap().credential();

        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.expired, 0);
        assert_eq!(lifecycle.validate(&credential).await.unwrap(), ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn test_sweep_reclaims_expired_pairs() {
        let (lifecycle, sweeper, clock) = setup();
        let old = lifecycle.create_token_pair("u1", None).await.unwrap().credential();
        clock.advance(chrono::Duration::seconds(30));
        let fresh = lifecycle.create_token_pair("u1", None).await.unwrap().credential();
        clock.advance(chrono::Duration::seconds(30));

        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.expired, 1);
        assert_eq!(report.values_removed, 2);
        // the user still has the fresh pair, nothing emptied
        assert_eq!(report.keys_deleted, 0);

        assert_eq!(lifecycle.validate(&old).await.unwrap(), ValidationOutcome::Invalid);
        assert_eq!(lifecycle.validate(&fresh).await.unwrap(), ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn test_sweep_skips_malformed_entries() {
        let (_, sweeper, clock) = setup();
        let mut batch = Batch::new();
        batch.zadd("remme:expires", clock.unix_seconds() - 1, "not json");
        sweeper.sweep.storage.execute(batch).await.unwrap();

        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.expired, 1);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.values_removed, 0);

        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.expired, 0);
    }

    #[tokio::test]
    async fn test_events_bracket_successful_cycle() {
        let (_, sweeper, clock) = setup();
        let mut events = sweeper.subscribe();

        let report = sweeper.sweep_once().await.unwrap();

        let started = events.recv().await.unwrap();
        assert_eq!(started, SweepEvent::Started { at: clock.now() });
        assert_eq!(started.to_string(), "sweep-started");
        let finished = events.recv().await.unwrap();
        assert_eq!(finished.as_ref(), "sweep-finished");
        assert_eq!(finished, SweepEvent::Finished(report));
    }

    #[tokio::test]
    async fn test_failure_goes_to_handler_once() {
        let storage = MemoryBackend::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let sweeper = CleanupSweeper::new(storage.clone(), Duration::from_secs(60))
            .with_error_handler(move |err| {
                assert!(err.is_store_error());
                seen.fetch_add(1, Ordering::SeqCst);
            });
        let mut events = sweeper.subscribe();

        // the index key holding a plain set makes ZRANGEBYSCORE fail
        let mut batch = Batch::new();
        batch.sadd("remme:expires", "x");
        storage.execute(batch).await.unwrap();

        let err = sweeper.sweep_once().await.unwrap_err();
        let expected = StorageError::wrong_type("remme:expires", "sorted set");
        assert!(err.to_string().contains(&expected.to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(matches!(events.recv().await.unwrap(), SweepEvent::Started { .. }));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_sweeps_immediately_then_on_interval() {
        let (lifecycle, sweeper, clock) = setup();
        let mut events = sweeper.subscribe();
        let credential = lifecycle.create_token_pair("u1", None).await.unwrap().credential();

        sweeper.start().await;
        assert!(sweeper.is_running().await);

        assert!(matches!(events.recv().await.unwrap(), SweepEvent::Started { .. }));
        let SweepEvent::Finished(first) = events.recv().await.unwrap() else {
            panic!("expected sweep-finished");
        };
        assert_eq!(first.expired, 0);

        clock.advance(chrono::Duration::seconds(120));

        assert!(matches!(events.recv().await.unwrap(), SweepEvent::Started { .. }));
        let SweepEvent::Finished(second) = events.recv().await.unwrap() else {
            panic!("expected sweep-finished");
        };
        assert_eq!(second.expired, 1);
        assert_eq!(second.keys_deleted, 2);

        sweeper.stop().await;
        assert!(!sweeper.is_running().await);
        assert_eq!(lifecycle.validate(&credential).await.unwrap(), ValidationOutcome::Invalid);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_cycles() {
        let (_, sweeper, _) = setup();
        let sweeper = sweeper.with_sweep_on_start(false);
        let mut events = sweeper.subscribe();

        sweeper.start().await;
        sweeper.stop().await;

        time::sleep(Duration::from_secs(3 * 3600)).await;
        assert!(events.try_recv().is_err());

        // stopping twice is harmless
        sweeper.stop().await;
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = RememberMeConfig::builder()
            .key_prefix("app")
            .sweep_on_start(false)
            .build();
        let sweeper = CleanupSweeper::from_config(MemoryBackend::new(), &config).unwrap();
        assert_eq!(sweeper.sweep.keys.expires_key(), "app:expires");
        assert!(!sweeper.sweep_on_start);
        assert_eq!(sweeper.interval, Duration::from_secs(3600));
    }
}
