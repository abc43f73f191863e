//! Shared run-control state for the relay loop.
//!
//! [`RelayControl`] is wrapped in [`Arc`](std::sync::Arc) and shared between
//! the tick scheduler, the Ctrl-C handler, and the status endpoint. The stop
//! flag and tick counters are atomics so readers never contend with the
//! tick loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

/// Stop signal and counters for one relay run.
#[derive(Debug)]
pub struct RelayControl {
    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Wakes everything waiting in [`RelayControl::stopped`].
    stop_notify: Notify,

    /// Milliseconds between tick starts.
    tick_interval_ms: u64,

    /// Wall-clock time the relay started.
    started_at: DateTime<Utc>,

    /// Ticks that produced and published a snapshot.
    ticks_published: AtomicU64,

    /// Ticks abandoned because assembly failed.
    ticks_skipped: AtomicU64,
}

impl RelayControl {
    /// Create control state for a relay ticking every `tick_interval_ms`.
    pub fn new(tick_interval_ms: u64) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            tick_interval_ms,
            started_at: Utc::now(),
            ticks_published: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean stop. Idempotent.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_waiters();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Wait until a stop is requested.
    ///
    /// Returns immediately if one already has been.
    pub async fn stopped(&self) {
        loop {
            // Register before checking the flag so a concurrent
            // `request_stop` cannot slip between the two.
            let notified = self.stop_notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }

    // -----------------------------------------------------------------------
    // Cadence and counters
    // -----------------------------------------------------------------------

    /// Milliseconds between tick starts.
    pub const fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    /// Wall-clock time the relay started.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whole seconds since the relay started.
    pub fn uptime_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        // `num_seconds` can be negative if clocks are weird; treat as 0.
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }

    /// Count a published tick.
    pub fn record_published(&self) {
        self.ticks_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a skipped tick.
    pub fn record_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Ticks that published a snapshot so far.
    pub fn ticks_published(&self) -> u64 {
        self.ticks_published.load(Ordering::Relaxed)
    }

    /// Ticks skipped so far.
    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped.load(Ordering::Relaxed)
    }
}
