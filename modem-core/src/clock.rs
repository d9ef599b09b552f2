//! Time sources for the modem engine.
//!
//! The engine needs two notions of time: a monotonic millisecond counter for
//! the escape guard time, call duration and activity LED, and the wall-clock
//! epoch seconds provided by the network time service.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Monotonic and wall-clock time.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed point.
    fn now_ms(&self) -> u64;

    /// Block the calling context for `duration`.
    fn sleep(&self, duration: Duration);

    /// Current wall-clock time in seconds since the Unix epoch.
    fn epoch_secs(&self) -> i64;
}

/// Clock backed by the host's monotonic and system clocks.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn epoch_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same time, so a test can keep one handle while the
/// engine owns another. `sleep` advances time instead of blocking.
#[derive(Clone, Default)]
pub struct ManualClock {
    ms: Arc<AtomicU64>,
    epoch: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock whose wall-clock time starts at `epoch` seconds.
    pub fn at_epoch(epoch: i64) -> Self {
        let clock = Self::default();
        clock.epoch.store(epoch, Ordering::SeqCst);
        clock
    }

    /// Move time forward.
    pub fn advance(&self, ms: u64) {
        let before = self.ms.fetch_add(ms, Ordering::SeqCst);
        let whole_secs = (before + ms) / 1000 - before / 1000;
        self.epoch.fetch_add(whole_secs as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration.as_millis() as u64);
    }

    fn epoch_secs(&self) -> i64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::at_epoch(1_700_000_000);
        let handle = clock.clone();
        handle.advance(1500);
        assert_eq!(clock.now_ms(), 1500);
        assert_eq!(clock.epoch_secs(), 1_700_000_001);
        clock.sleep(Duration::from_millis(500));
        assert_eq!(handle.now_ms(), 2000);
        assert_eq!(handle.epoch_secs(), 1_700_000_002);
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
        assert!(clock.epoch_secs() > 0);
    }
}
