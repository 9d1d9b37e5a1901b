use core::time::Duration;
use std::{
    collections::VecDeque,
    sync::Arc,
    thread::{self, JoinHandle},
};

use parking_lot::{Condvar, Mutex, MutexGuard};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    GenerateError, TimeSource, UidFields, UidGenerator, UidLayout,
    generator::interface::{check_timestamp, decode_with},
};

/// Upper bound on the number of UIDs a single buffered generator may hold.
pub const MAX_BUFFER_CAPACITY: usize = 1 << 24;

/// Sizing and refill policy of a [`BufferedUidGenerator`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferConfig {
    /// The buffer holds `(max_sequence + 1) << boost_power` UIDs, i.e.
    /// `2^boost_power` seconds worth of sequence space.
    pub boost_power: u32,
    /// Refill once fewer than this percentage of the capacity remains.
    pub padding_factor: u8,
    /// Additionally refill on this fixed period, if set.
    pub padding_interval: Option<Duration>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            boost_power: 3,
            padding_factor: 50,
            padding_interval: None,
        }
    }
}

impl BufferConfig {
    /// Number of UIDs a buffer built for `layout` holds, or `None` if that
    /// exceeds [`MAX_BUFFER_CAPACITY`].
    pub fn capacity(&self, layout: &UidLayout) -> Option<usize> {
        let per_second = usize::try_from(layout.max_sequence().checked_add(1)?).ok()?;
        let capacity = per_second.checked_shl(self.boost_power)?;
        // `checked_shl` only guards the shift amount, not lost high bits.
        if capacity >> self.boost_power != per_second || capacity > MAX_BUFFER_CAPACITY {
            return None;
        }
        Some(capacity)
    }

    /// Remaining UIDs below which the padding thread refills.
    pub fn threshold(&self, capacity: usize) -> usize {
        capacity * usize::from(self.padding_factor) / 100
    }
}

struct Ring {
    slots: VecDeque<u64>,
    last_secs: u64,
    stalled: bool,
    shutdown: bool,
}

struct Shared<T> {
    layout: UidLayout,
    worker_id: u64,
    time: T,
    capacity: usize,
    threshold: usize,
    interval: Option<Duration>,
    ring: Mutex<Ring>,
    wake: Condvar,
}

impl<T: TimeSource> Shared<T> {
    fn per_second(&self) -> usize {
        // Bounded by `capacity`, which already fits in a usize.
        (self.layout.max_sequence() + 1) as usize
    }

    /// Appends whole seconds of UIDs until less than one second of room is
    /// left. With `fair` set the lock is handed over to waiting consumers
    /// between seconds.
    fn fill(&self, ring: &mut MutexGuard<'_, Ring>, fair: bool) -> Result<usize, GenerateError> {
        let per_second = self.per_second();
        let mut added = 0;

        while !ring.shutdown && self.capacity - ring.slots.len() >= per_second {
            // Seconds are borrowed from the future when the buffer drains
            // faster than the clock ticks.
            let secs = check_timestamp(
                &self.layout,
                self.time.current_secs().max(ring.last_secs + 1),
            )?;
            ring.slots.extend(
                (0..=self.layout.max_sequence())
                    .map(|sequence| self.layout.compose(secs, self.worker_id, sequence)),
            );
            ring.last_secs = secs;
            added += per_second;

            if fair {
                MutexGuard::bump(ring);
            }
        }

        Ok(added)
    }
}

/// A UID generator that serves UIDs out of a pre-filled buffer.
///
/// The buffer is filled completely on construction. A background padding
/// thread tops it up whenever the remaining UIDs fall below the configured
/// [`BufferConfig::padding_factor`], so callers normally just pop a
/// precomputed value.
///
/// Each refill step claims one whole second: the later of the current clock
/// second and the last claimed second plus one, together with every sequence
/// value of it. Under sustained load the generator therefore runs ahead of
/// the clock instead of waiting for it, and a clock moving backwards never
/// stops it.
///
/// Dropping the generator stops and joins its padding thread.
///
/// ## See Also
/// - [`DirectUidGenerator`]
///
/// [`DirectUidGenerator`]: crate::DirectUidGenerator
pub struct BufferedUidGenerator<T> {
    shared: Arc<Shared<T>>,
    padder: Option<JoinHandle<()>>,
}

impl<T> BufferedUidGenerator<T>
where
    T: TimeSource + Send + Sync + 'static,
{
    /// Creates a generator bound to `worker_id`, fills its buffer and starts
    /// the padding thread.
    ///
    /// # Errors
    ///
    /// - [`GenerateError::BufferTooLarge`] if the buffer would exceed
    ///   [`MAX_BUFFER_CAPACITY`].
    /// - [`GenerateError::TimestampExhausted`] if the initial fill runs past
    ///   the layout's timestamp range.
    pub fn new(
        worker_id: u64,
        layout: UidLayout,
        time: T,
        config: &BufferConfig,
    ) -> Result<Self, GenerateError> {
        let capacity = config
            .capacity(&layout)
            .ok_or(GenerateError::BufferTooLarge {
                sequence_bits: layout.sequence_bits(),
                boost_power: config.boost_power,
                max: MAX_BUFFER_CAPACITY,
            })?;
        let last_secs = time.current_secs().saturating_sub(1);

        let shared = Arc::new(Shared {
            layout,
            worker_id: worker_id & layout.max_worker_id(),
            time,
            capacity,
            threshold: config.threshold(capacity),
            interval: config.padding_interval,
            ring: Mutex::new(Ring {
                slots: VecDeque::with_capacity(capacity),
                last_secs,
                stalled: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        shared.fill(&mut shared.ring.lock(), false)?;

        let worker = Arc::clone(&shared);
        let padder = thread::Builder::new()
            .name(format!("zsid-padder-{}", shared.worker_id))
            .spawn(move || padding_loop(&worker));

        let padder = match padder {
            Ok(handle) => Some(handle),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    worker_id = shared.worker_id,
                    "failed to spawn padding thread, refilling inline only: {_e}"
                );
                None
            }
        };

        Ok(Self { shared, padder })
    }
}

impl<T: TimeSource> BufferedUidGenerator<T> {
    /// Total number of UIDs the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of UIDs currently buffered.
    pub fn remaining(&self) -> usize {
        self.shared.ring.lock().slots.len()
    }

    /// Takes the next buffered UID, refilling inline if the buffer ran dry.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self), fields(worker_id = self.shared.worker_id)))]
    fn take(&self) -> Result<u64, GenerateError> {
        let shared = &*self.shared;
        let mut ring = shared.ring.lock();

        loop {
            if let Some(uid) = ring.slots.pop_front() {
                if !ring.stalled && ring.slots.len() < shared.threshold {
                    shared.wake.notify_one();
                }
                return Ok(uid);
            }

            match shared.fill(&mut ring, false) {
                Ok(_) => ring.stalled = false,
                Err(err) => {
                    ring.stalled = true;
                    return Err(err);
                }
            }
        }
    }
}

fn padding_loop<T: TimeSource>(shared: &Shared<T>) {
    #[cfg(feature = "tracing")]
    tracing::trace!(worker_id = shared.worker_id, "padding thread started");

    let mut ring = shared.ring.lock();
    loop {
        if ring.shutdown {
            break;
        }

        let starving = !ring.stalled && ring.slots.len() < shared.threshold;
        if !starving {
            let scheduled = match shared.interval {
                Some(interval) => shared.wake.wait_for(&mut ring, interval).timed_out(),
                None => {
                    shared.wake.wait(&mut ring);
                    false
                }
            };
            if !scheduled || ring.shutdown || ring.stalled {
                continue;
            }
        }

        match shared.fill(&mut ring, true) {
            Ok(_added) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    worker_id = shared.worker_id,
                    added = _added,
                    remaining = ring.slots.len(),
                    "buffer padded"
                );
            }
            Err(_err) => {
                ring.stalled = true;
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    worker_id = shared.worker_id,
                    "buffer padding failed, waiting for an inline refill: {_err}"
                );
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(worker_id = shared.worker_id, "padding thread stopped");
}

impl<T> Drop for BufferedUidGenerator<T> {
    fn drop(&mut self) {
        self.shared.ring.lock().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.padder.take() {
            let _ = handle.join();
        }
    }
}

impl<T> UidGenerator for BufferedUidGenerator<T>
where
    T: TimeSource + Send + Sync,
{
    fn worker_id(&self) -> u64 {
        self.shared.worker_id
    }

    fn layout(&self) -> UidLayout {
        self.shared.layout
    }

    fn try_next_id(&self) -> Result<u64, GenerateError> {
        self.take()
    }

    fn decode(&self, uid: u64) -> Result<UidFields, GenerateError> {
        decode_with(&self.shared.layout, &self.shared.time, uid)
    }
}
