use core::{cmp::Ordering, time::Duration};
use std::thread;

use parking_lot::Mutex;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    GenerateError, IdGenStatus, TimeSource, UidFields, UidGenerator, UidLayout,
    generator::interface::{check_timestamp, decode_with},
};

/// How long [`DirectUidGenerator::try_next_id`] sleeps between polls while the
/// sequence of the current second is exhausted.
const PENDING_BACKOFF: Duration = Duration::from_millis(1);

#[derive(Copy, Clone, Debug)]
struct DirectState {
    last_secs: u64,
    sequence: u64,
}

/// A lock-based UID generator that computes every UID on demand.
///
/// The `(last second, sequence)` state sits behind a [`Mutex`], allowing the
/// generator to be shared across threads.
///
/// ## Behavior
/// - Same second as the previous UID: the sequence is bumped. Once it is
///   exhausted the generator reports [`IdGenStatus::Pending`] until the clock
///   reaches the next second.
/// - A later second: the sequence resets to zero.
/// - An earlier second: [`GenerateError::ClockMovedBackwards`]. The generator
///   refuses to issue UIDs that could collide with ones it already issued.
///
/// ## See Also
/// - [`BufferedUidGenerator`]
///
/// [`BufferedUidGenerator`]: crate::BufferedUidGenerator
pub struct DirectUidGenerator<T> {
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<DirectState>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<DirectState>,
    layout: UidLayout,
    worker_id: u64,
    time: T,
}

impl<T: TimeSource> DirectUidGenerator<T> {
    /// Creates a generator bound to `worker_id`.
    ///
    /// The worker id is truncated to the layout's worker id width; the
    /// registry rejects oversized ids before they get here.
    pub fn new(worker_id: u64, layout: UidLayout, time: T) -> Self {
        Self::from_components(0, worker_id, 0, layout, time)
    }

    /// Creates a generator preloaded with the given state.
    ///
    /// Useful for tests or for resuming right after a known last second.
    /// Prefer [`Self::new`] in typical use.
    pub fn from_components(
        last_secs: u64,
        worker_id: u64,
        sequence: u64,
        layout: UidLayout,
        time: T,
    ) -> Self {
        let state = Mutex::new(DirectState {
            last_secs,
            sequence,
        });
        Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(state),
            #[cfg(not(feature = "cache-padded"))]
            state,
            layout,
            worker_id: worker_id & layout.max_worker_id(),
            time,
        }
    }

    /// Attempts to generate the next UID without blocking.
    ///
    /// # Returns
    /// - `Ok(IdGenStatus::Ready { id })`: a new UID is available
    /// - `Ok(IdGenStatus::Pending { yield_for })`: the sequence of the current
    ///   second is exhausted
    ///
    /// # Errors
    /// - [`GenerateError::TimestampExhausted`] once the clock passes the
    ///   layout's timestamp range
    /// - [`GenerateError::ClockMovedBackwards`] if the clock reads earlier than
    ///   the last second used
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self), fields(worker_id = self.worker_id)))]
    pub fn try_poll_id(&self) -> Result<IdGenStatus, GenerateError> {
        // Read the clock under the lock, otherwise an earlier second may only
        // mean another thread got here first.
        let mut state = self.state.lock();
        let now = check_timestamp(&self.layout, self.time.current_secs())?;

        match now.cmp(&state.last_secs) {
            Ordering::Equal => {
                if state.sequence < self.layout.max_sequence() {
                    state.sequence += 1;
                    Ok(IdGenStatus::Ready {
                        id: self.layout.compose(now, self.worker_id, state.sequence),
                    })
                } else {
                    Ok(IdGenStatus::Pending { yield_for: 1 })
                }
            }
            Ordering::Greater => {
                state.last_secs = now;
                state.sequence = 0;
                Ok(IdGenStatus::Ready {
                    id: self.layout.compose(now, self.worker_id, 0),
                })
            }
            Ordering::Less => Err(Self::cold_clock_behind(now, state.last_secs)),
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: u64, last_secs: u64) -> GenerateError {
        GenerateError::ClockMovedBackwards {
            refused_secs: last_secs - now,
        }
    }
}

impl<T> UidGenerator for DirectUidGenerator<T>
where
    T: TimeSource + Send + Sync,
{
    fn worker_id(&self) -> u64 {
        self.worker_id
    }

    fn layout(&self) -> UidLayout {
        self.layout
    }

    fn try_next_id(&self) -> Result<u64, GenerateError> {
        loop {
            match self.try_poll_id()? {
                IdGenStatus::Ready { id } => return Ok(id),
                IdGenStatus::Pending { .. } => thread::sleep(PENDING_BACKOFF),
            }
        }
    }

    fn decode(&self, uid: u64) -> Result<UidFields, GenerateError> {
        decode_with(&self.layout, &self.time, uid)
    }
}
