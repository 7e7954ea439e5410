//! Background expiry sweeper for Crumb session stores.
//!
//! Expired sessions are already rejected when they are read, so the reaper
//! is about reclaiming space, not about security. It runs as a single Tokio
//! task that calls [`SessionStore::remove_expired`] once per interval.
//!
//! # Failure handling
//!
//! A sweep that fails or times out is logged at `warn` and counted. The
//! loop keeps going and the next tick tries again. Nothing the store does
//! can end the loop; only [`ReaperHandle::shutdown`] or dropping the
//! handle does.
//!
//! # Integration
//!
//! ```ignore
//! let store = Arc::new(MemoryStore::<MyPayload>::new());
//! let mut reaper = crumb_reaper::spawn::<MyPayload, _, _>(
//!     Arc::clone(&store),
//!     ReaperConfig::every(Duration::from_secs(600)),
//!     Utc::now,
//! );
//! // ... serve requests ...
//! reaper.shutdown().await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crumb_store::SessionStore;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the reaper loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperConfig {
    /// Time between sweeps. The first sweep happens one interval after
    /// the reaper starts.
    pub interval: Duration,
    /// Longest a single sweep may take before it is abandoned and counted
    /// as a failure.
    pub sweep_timeout: Duration,
    /// Random delay (0..=max) added before the first sweep, so reapers
    /// started together against a shared backend don't sweep in lockstep.
    pub initial_jitter: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            sweep_timeout: Duration::from_secs(30),
            initial_jitter: Duration::ZERO,
        }
    }
}

impl ReaperConfig {
    /// Shortest allowed interval. Anything smaller would turn the reaper
    /// into a busy loop against the store.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// Create a config for a specific interval with default settings.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`spawn`]. Rules:
    /// - `interval` raised to at least [`Self::MIN_INTERVAL`].
    /// - A zero `sweep_timeout` becomes `interval`.
    /// - `initial_jitter` capped at `interval`.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "reap interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if self.sweep_timeout.is_zero() {
            self.sweep_timeout = self.interval;
        }
        if self.initial_jitter > self.interval {
            self.initial_jitter = self.interval;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters describing what the reaper has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaperStats {
    /// Sweeps attempted.
    pub sweeps: u64,
    /// Sweeps that returned an error or timed out.
    pub failures: u64,
    /// Records removed across all successful sweeps.
    pub removed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    sweeps: AtomicU64,
    failures: AtomicU64,
    removed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ReaperStats {
        ReaperStats {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owner of a running reaper task.
///
/// Dropping the handle aborts the task. Call [`shutdown`](Self::shutdown)
/// to stop it cleanly and wait for an in-flight sweep to finish.
#[derive(Debug)]
pub struct ReaperHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
    interval: Duration,
}

impl ReaperHandle {
    /// Signals the loop to stop and waits for it to exit.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        // Err only means the loop is already gone.
        let _ = self.stop.send(true);
        if let Err(e) = task.await {
            if e.is_panic() {
                warn!(error = %e, "reaper task panicked");
            }
        }
        info!(stats = ?self.counters.snapshot(), "reaper stopped");
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Snapshot of the reaper's counters.
    pub fn stats(&self) -> ReaperStats {
        self.counters.snapshot()
    }

    /// The (validated) sweep interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Starts the reaper on the current Tokio runtime.
///
/// `now` supplies the UTC instant passed to `remove_expired` on every
/// sweep; production code passes `Utc::now`.
///
/// # Panics
/// Panics if called outside a Tokio runtime.
pub fn spawn<P, S, N>(store: S, config: ReaperConfig, now: N) -> ReaperHandle
where
    P: 'static,
    S: SessionStore<P>,
    N: Fn() -> DateTime<Utc> + Send + Sync + 'static,
{
    let config = config.validated();
    let counters = Arc::new(Counters::default());
    let (stop_tx, stop_rx) = watch::channel(false);
    let interval = config.interval;

    debug!(
        interval_secs = interval.as_secs_f64(),
        sweep_timeout_secs = config.sweep_timeout.as_secs_f64(),
        "reaper started"
    );

    let task = tokio::spawn(run::<P, S, N>(
        store,
        config,
        now,
        Arc::clone(&counters),
        stop_rx,
    ));

    ReaperHandle {
        stop: stop_tx,
        task: Some(task),
        counters,
        interval,
    }
}

async fn run<P, S, N>(
    store: S,
    config: ReaperConfig,
    now: N,
    counters: Arc<Counters>,
    mut stop: watch::Receiver<bool>,
) where
    P: 'static,
    S: SessionStore<P>,
    N: Fn() -> DateTime<Utc> + Send + Sync + 'static,
{
    let jitter = if config.initial_jitter.is_zero() {
        Duration::ZERO
    } else {
        let max_ms = config.initial_jitter.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    };

    let mut ticker = time::interval_at(Instant::now() + config.interval + jitter, config.interval);
    // A slow sweep pushes the schedule back instead of bunching sweeps up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                sweep::<P, S>(&store, &config, now(), &counters).await;
            }
        }
    }
}

async fn sweep<P, S>(store: &S, config: &ReaperConfig, now: DateTime<Utc>, counters: &Counters)
where
    S: SessionStore<P>,
{
    let sweep = counters.sweeps.fetch_add(1, Ordering::Relaxed) + 1;

    match time::timeout(
        config.sweep_timeout,
        <S as SessionStore<P>>::remove_expired(store, now),
    )
    .await
    {
        Ok(Ok(removed)) => {
            counters.removed.fetch_add(removed as u64, Ordering::Relaxed);
            trace!(sweep, removed, "expired sessions swept");
        }
        Ok(Err(e)) => {
            counters.failures.fetch_add(1, Ordering::Relaxed);
            warn!(sweep, error = %e, "session sweep failed, retrying next tick");
        }
        Err(_) => {
            counters.failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                sweep,
                timeout_ms = config.sweep_timeout.as_millis() as u64,
                "session sweep timed out, retrying next tick"
            );
        }
    }
}
