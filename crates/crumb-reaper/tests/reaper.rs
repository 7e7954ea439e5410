//! Integration tests for the reaper loop.
//!
//! Uses `start_paused = true` so Tokio auto-advances time whenever every
//! task is idle. A `sleep` in the test therefore lets every sweep scheduled
//! before its deadline run first, without waiting in real time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use crumb_reaper::{ReaperConfig, ReaperStats};
use crumb_store::{MemoryStore, SessionRecord, SessionStore, StoreError};

// =========================================================================
// Helpers
// =========================================================================

const INTERVAL: Duration = Duration::from_secs(60);

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Fixed "now" for every sweep: anything expiring at or before t=100 goes.
fn fixed_now() -> DateTime<Utc> {
    at(100)
}

async fn store_with(expired: u32, live: u32) -> Arc<MemoryStore<u32>> {
    let store = Arc::new(MemoryStore::new());
    for i in 0..expired {
        store
            .set(SessionRecord::new(format!("expired-{i}"), at(50), i))
            .await
            .unwrap();
    }
    for i in 0..live {
        store
            .set(SessionRecord::new(format!("live-{i}"), at(500), i))
            .await
            .unwrap();
    }
    store
}

/// Wraps a `MemoryStore` and fails the first `failures` sweeps.
struct FlakyStore {
    inner: MemoryStore<u32>,
    failures: AtomicU32,
}

impl SessionStore<u32> for FlakyStore {
    async fn get(&self, id: &str) -> Result<Option<SessionRecord<u32>>, StoreError> {
        self.inner.get(id).await
    }

    async fn set(&self, record: SessionRecord<u32>) -> Result<(), StoreError> {
        self.inner.set(record).await
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.remove(id).await
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.inner.remove_expired(now).await
    }
}

/// A store whose sweep never completes.
struct HangingStore;

impl SessionStore<u32> for HangingStore {
    async fn get(&self, _id: &str) -> Result<Option<SessionRecord<u32>>, StoreError> {
        Ok(None)
    }

    async fn set(&self, _record: SessionRecord<u32>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn remove(&self, _id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn remove_expired(&self, _now: DateTime<Utc>) -> Result<usize, StoreError> {
        std::future::pending().await
    }
}

// =========================================================================
// ReaperConfig
// =========================================================================

#[test]
fn test_validated_clamps_zero_interval() {
    let cfg = ReaperConfig::every(Duration::ZERO).validated();

    assert_eq!(cfg.interval, ReaperConfig::MIN_INTERVAL);
}

#[test]
fn test_validated_zero_timeout_becomes_interval() {
    let cfg = ReaperConfig {
        sweep_timeout: Duration::ZERO,
        ..ReaperConfig::every(INTERVAL)
    }
    .validated();

    assert_eq!(cfg.sweep_timeout, INTERVAL);
}

#[test]
fn test_validated_caps_jitter_at_interval() {
    let cfg = ReaperConfig {
        initial_jitter: Duration::from_secs(3600),
        ..ReaperConfig::every(INTERVAL)
    }
    .validated();

    assert_eq!(cfg.initial_jitter, INTERVAL);
}

#[test]
fn test_default_config_values() {
    let cfg = ReaperConfig::default();

    assert_eq!(cfg.interval, Duration::from_secs(600));
    assert_eq!(cfg.sweep_timeout, Duration::from_secs(30));
    assert_eq!(cfg.initial_jitter, Duration::ZERO);
}

// =========================================================================
// Sweeping
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_no_sweep_before_first_interval() {
    let store = store_with(3, 0).await;
    let reaper = crumb_reaper::spawn::<u32, _, _>(
        Arc::clone(&store),
        ReaperConfig::every(INTERVAL),
        fixed_now,
    );

    tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;

    assert_eq!(reaper.stats(), ReaperStats::default());
    assert_eq!(store.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_removes_only_expired_records() {
    let store = store_with(3, 2).await;
    let reaper = crumb_reaper::spawn::<u32, _, _>(
        Arc::clone(&store),
        ReaperConfig::every(INTERVAL),
        fixed_now,
    );

    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;

    assert_eq!(
        reaper.stats(),
        ReaperStats {
            sweeps: 1,
            failures: 0,
            removed: 3
        }
    );
    assert_eq!(store.len(), 2);
    assert!(store.get("live-0").await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_sweeps_repeat_every_interval() {
    let store = store_with(0, 1).await;
    let reaper = crumb_reaper::spawn::<u32, _, _>(
        Arc::clone(&store),
        ReaperConfig::every(INTERVAL),
        fixed_now,
    );

    tokio::time::sleep(INTERVAL * 3 + Duration::from_secs(1)).await;

    assert_eq!(reaper.stats().sweeps, 3);
    assert_eq!(reaper.interval(), INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_jitter_delays_first_sweep_within_bound() {
    let store = store_with(1, 0).await;
    let reaper = crumb_reaper::spawn::<u32, _, _>(
        Arc::clone(&store),
        ReaperConfig {
            initial_jitter: Duration::from_secs(10),
            ..ReaperConfig::every(INTERVAL)
        },
        fixed_now,
    );

    tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;
    assert_eq!(reaper.stats().sweeps, 0);

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(reaper.stats().sweeps, 1);
    assert!(store.is_empty());
}

// =========================================================================
// Failures never stop the loop
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_sweeps_are_retried_next_tick() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        failures: AtomicU32::new(2),
    });
    store
        .set(SessionRecord::new("expired", at(10), 0))
        .await
        .unwrap();
    let reaper = crumb_reaper::spawn::<u32, _, _>(
        Arc::clone(&store),
        ReaperConfig::every(INTERVAL),
        fixed_now,
    );

    tokio::time::sleep(INTERVAL * 3 + Duration::from_secs(1)).await;

    assert_eq!(
        reaper.stats(),
        ReaperStats {
            sweeps: 3,
            failures: 2,
            removed: 1
        }
    );
    assert!(reaper.is_running());
    assert!(store.inner.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hanging_sweep_times_out_and_loop_continues() {
    let reaper = crumb_reaper::spawn::<u32, _, _>(
        Arc::new(HangingStore),
        ReaperConfig {
            sweep_timeout: Duration::from_secs(5),
            ..ReaperConfig::every(INTERVAL)
        },
        fixed_now,
    );

    tokio::time::sleep(INTERVAL + Duration::from_secs(10)).await;
    assert_eq!(reaper.stats().failures, 1);
    assert!(reaper.is_running());

    tokio::time::sleep(INTERVAL).await;
    assert_eq!(reaper.stats().sweeps, 2);
    assert_eq!(reaper.stats().failures, 2);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_future_sweeps() {
    let store = store_with(0, 0).await;
    let mut reaper = crumb_reaper::spawn::<u32, _, _>(
        Arc::clone(&store),
        ReaperConfig::every(INTERVAL),
        fixed_now,
    );
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(reaper.stats().sweeps, 1);

    reaper.shutdown().await;
    store
        .set(SessionRecord::new("expired", at(10), 0))
        .await
        .unwrap();
    tokio::time::sleep(INTERVAL * 5).await;

    assert!(!reaper.is_running());
    assert_eq!(reaper.stats().sweeps, 1);
    assert_eq!(store.len(), 1, "no sweep may run after shutdown");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_twice_is_noop() {
    let mut reaper = crumb_reaper::spawn::<u32, _, _>(
        Arc::new(MemoryStore::new()),
        ReaperConfig::every(INTERVAL),
        fixed_now,
    );

    reaper.shutdown().await;
    reaper.shutdown().await;

    assert!(!reaper.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_drop_handle_aborts_loop() {
    let store = store_with(1, 0).await;
    let reaper = crumb_reaper::spawn::<u32, _, _>(
        Arc::clone(&store),
        ReaperConfig::every(INTERVAL),
        fixed_now,
    );

    drop(reaper);
    tokio::time::sleep(INTERVAL * 3).await;

    assert_eq!(store.len(), 1);
}
