use core::time::Duration;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::{DEFAULT_EPOCH, TimeSource};

/// A monotonic time source that returns elapsed time since construction,
/// offset from a user-defined epoch.
///
/// This avoids wall-clock adjustments (e.g., NTP or daylight savings changes)
/// while still aligning timestamps to a fixed origin.
///
/// Internally, the clock captures `Instant::now()` at construction together
/// with the distance between the wall clock and the epoch at that moment.
/// Later reads add the monotonic elapsed time to that offset, so the value
/// never goes backward even if the system clock is stepped.
#[derive(Copy, Clone, Debug)]
pub struct MonotonicClock {
    start: Instant,
    epoch: Duration,
    epoch_offset: Duration,
}

impl Default for MonotonicClock {
    /// Constructs a monotonic clock aligned to [`DEFAULT_EPOCH`].
    fn default() -> Self {
        Self::with_epoch(DEFAULT_EPOCH)
    }
}

impl MonotonicClock {
    /// Constructs a monotonic clock using `epoch` (a duration since
    /// 1970-01-01 UTC) as the origin (t = 0).
    ///
    /// If the system clock reads earlier than `epoch` at construction, the
    /// clock starts counting from zero.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::{SystemTime, UNIX_EPOCH};
    /// use zsid::{MonotonicClock, TimeSource};
    ///
    /// let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    /// let clock = MonotonicClock::with_epoch(now);
    ///
    /// // Anchored at "now", so barely any whole second has elapsed yet.
    /// assert!(clock.current_secs() <= 1);
    /// ```
    pub fn with_epoch(epoch: Duration) -> Self {
        let start = Instant::now();
        let system_now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        Self {
            start,
            epoch,
            epoch_offset: system_now.saturating_sub(epoch),
        }
    }
}

impl TimeSource for MonotonicClock {
    fn current_secs(&self) -> u64 {
        (self.epoch_offset + self.start.elapsed()).as_secs()
    }

    fn epoch(&self) -> Duration {
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemClock;

    #[test]
    fn tracks_system_clock_at_start() {
        let mono = MonotonicClock::default();
        let system = SystemClock::default();
        let diff = mono.current_secs().abs_diff(system.current_secs());
        assert!(diff <= 1, "monotonic and system clocks diverged by {diff}s");
    }

    #[test]
    fn never_goes_backwards() {
        let clock = MonotonicClock::default();
        let mut last = clock.current_secs();
        for _ in 0..1000 {
            let now = clock.current_secs();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn future_epoch_reads_zero() {
        let far_future = Duration::from_secs(u64::from(u32::MAX) * 4);
        let clock = MonotonicClock::with_epoch(far_future);
        assert_eq!(clock.current_secs(), 0);
        assert_eq!(clock.epoch(), far_future);
    }
}
