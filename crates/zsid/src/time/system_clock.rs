use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{DEFAULT_EPOCH, TimeSource};

/// A wall-clock time source.
///
/// Every call reads `SystemTime::now()`, so NTP adjustments or manual changes
/// to the system clock are visible to the generators, including steps
/// backwards. Prefer [`MonotonicClock`] unless ids must track the wall clock
/// exactly.
///
/// A system clock earlier than the epoch reads as `0`.
///
/// [`MonotonicClock`]: crate::MonotonicClock
#[derive(Copy, Clone, Debug)]
pub struct SystemClock {
    epoch: Duration,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::with_epoch(DEFAULT_EPOCH)
    }
}

impl SystemClock {
    pub const fn with_epoch(epoch: Duration) -> Self {
        Self { epoch }
    }
}

impl TimeSource for SystemClock {
    fn current_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_sub(self.epoch)
            .as_secs()
    }

    fn epoch(&self) -> Duration {
        self.epoch
    }
}
