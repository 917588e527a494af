//! Tick clock shared between the host and sleeping jobs.
//!
//! The scheduler never reads wall-clock time on its own. The host refreshes
//! a [`TickClock`] once per tick with its notion of elapsed time, and
//! deadline-based wait conditions compare against that snapshot. This keeps
//! sleep behavior in lockstep with the host's time source (scaled time,
//! paused time, replayed time) instead of the OS clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Monotonically advancing elapsed-time value, refreshed by the host.
///
/// Clones share the same underlying instant, so a clock handle can be given
/// to jobs, wait conditions, and the host driver alike.
#[derive(Debug, Clone)]
pub struct TickClock {
    micros: Arc<AtomicU64>,
}

impl TickClock {
    /// Create a clock starting at zero elapsed time.
    pub fn new() -> Self {
        Self {
            micros: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The most recent elapsed-time reading.
    pub fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::Acquire))
    }

    /// Refresh the clock to the host's elapsed-time reading.
    ///
    /// Readings are max-merged: a stale value never moves the clock
    /// backwards, so two tick rates may refresh the same clock in either
    /// order.
    pub fn advance_to(&self, elapsed: Duration) {
        self.micros
            .fetch_max(elapsed.as_micros() as u64, Ordering::AcqRel);
    }

    /// Advance the clock by a delta.
    pub fn advance_by(&self, delta: Duration) {
        self.micros
            .fetch_add(delta.as_micros() as u64, Ordering::AcqRel);
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}
