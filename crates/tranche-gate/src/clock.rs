use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tranche_types::Timestamp;

/// Source of the current time.
///
/// Timelock waits compare against `now()` at call time; nothing sleeps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock, clamped so successive reads never go backwards.
#[derive(Debug, Default)]
pub struct SystemClock {
    high_water: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = Timestamp::now().as_secs();
        let prev = self.high_water.fetch_max(wall, Ordering::SeqCst);
        Timestamp(prev.max(wall))
    }
}

/// Manually driven clock for tests and scripted replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            secs: AtomicU64::new(start.as_secs()),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.secs.store(at.as_secs(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) -> Timestamp {
        let secs = by.as_secs();
        let prev = self
            .secs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                Some(cur.saturating_add(secs))
            })
            .unwrap_or_else(|cur| cur);
        Timestamp(prev.saturating_add(secs))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.secs.load(Ordering::SeqCst))
    }
}
