use core::time::Duration;
use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use std::thread::{self, scope};

use portable_atomic::{AtomicBool, AtomicU64, Ordering};

use crate::{
    BufferConfig, BufferedUidGenerator, DEFAULT_EPOCH, DirectUidGenerator, GenerateError,
    GeneratorHandle, GeneratorVariant, IdGenStatus, MonotonicClock, TimeSource, UidGenerator,
    UidLayout, WorkerToken,
};

struct StepTime {
    secs: AtomicU64,
}

impl StepTime {
    fn at(secs: u64) -> Arc<Self> {
        Arc::new(Self {
            secs: AtomicU64::new(secs),
        })
    }

    fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::Release);
    }
}

impl TimeSource for StepTime {
    fn current_secs(&self) -> u64 {
        self.secs.load(Ordering::Acquire)
    }

    fn epoch(&self) -> Duration {
        DEFAULT_EPOCH
    }
}

/// A clock that parks the next reader right after it read the current
/// second, until the test thread lets it go.
struct StallingTime {
    secs: AtomicU64,
    stall_next: AtomicBool,
    gate: Barrier,
}

impl StallingTime {
    fn at(secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(secs),
            stall_next: AtomicBool::new(true),
            gate: Barrier::new(2),
        }
    }
}

impl TimeSource for StallingTime {
    fn current_secs(&self) -> u64 {
        let secs = self.secs.load(Ordering::Acquire);
        if self.stall_next.swap(false, Ordering::AcqRel) {
            self.gate.wait(); // parked
            self.gate.wait(); // released
        }
        secs
    }

    fn epoch(&self) -> Duration {
        DEFAULT_EPOCH
    }
}

/// 16 sequence values per second keeps buffers and rollovers small.
fn small_layout() -> UidLayout {
    UidLayout::new(31, 28, 4).unwrap()
}

trait IdGenStatusExt {
    fn unwrap_ready(self) -> u64;
    fn unwrap_pending(self) -> u64;
}

impl IdGenStatusExt for IdGenStatus {
    fn unwrap_ready(self) -> u64 {
        match self {
            Self::Ready { id } => id,
            Self::Pending { yield_for } => {
                panic!("unexpected pending (yield for: {yield_for})")
            }
        }
    }

    fn unwrap_pending(self) -> u64 {
        match self {
            Self::Ready { id } => panic!("unexpected ready ({id})"),
            Self::Pending { yield_for } => yield_for,
        }
    }
}

fn assert_strictly_increasing(ids: &[u64]) {
    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1], "{} is not below {}", pair[0], pair[1]);
    }
}

#[test]
fn direct_sequence_increments_within_same_second() {
    let layout = UidLayout::DEFAULT;
    let generator = DirectUidGenerator::new(5, layout, StepTime::at(42));

    let ids: Vec<_> = (0..3)
        .map(|_| generator.try_poll_id().unwrap().unwrap_ready())
        .collect();

    for (expected_sequence, id) in ids.iter().enumerate() {
        let parts = layout.decompose(*id).unwrap();
        assert_eq!(parts.timestamp, 42);
        assert_eq!(parts.worker_id, 5);
        assert_eq!(parts.sequence, expected_sequence as u64);
    }
    assert_strictly_increasing(&ids);
}

#[test]
fn direct_returns_pending_when_sequence_exhausted() {
    let layout = small_layout();
    let generator =
        DirectUidGenerator::from_components(42, 1, layout.max_sequence(), layout, StepTime::at(42));
    assert_eq!(generator.try_poll_id().unwrap().unwrap_pending(), 1);
}

#[test]
fn direct_rolls_over_to_next_second() {
    let layout = small_layout();
    let time = StepTime::at(42);
    let generator = DirectUidGenerator::new(3, layout, Arc::clone(&time));

    for sequence in 0..=layout.max_sequence() {
        let parts = layout
            .decompose(generator.try_poll_id().unwrap().unwrap_ready())
            .unwrap();
        assert_eq!((parts.timestamp, parts.sequence), (42, sequence));
    }
    generator.try_poll_id().unwrap().unwrap_pending();

    time.set(43);
    let parts = layout
        .decompose(generator.try_poll_id().unwrap().unwrap_ready())
        .unwrap();
    assert_eq!((parts.timestamp, parts.sequence), (43, 0));
}

#[test]
fn direct_next_id_waits_out_exhausted_sequence() {
    let layout = small_layout();
    let time = StepTime::at(42);
    let generator = DirectUidGenerator::from_components(
        42,
        1,
        layout.max_sequence(),
        layout,
        Arc::clone(&time),
    );

    let uid = scope(|s| {
        let waiter = s.spawn(|| generator.try_next_id());
        thread::sleep(Duration::from_millis(20));
        time.set(43);
        waiter.join().unwrap()
    })
    .unwrap();

    assert_eq!(layout.decompose(uid).unwrap().timestamp, 43);
}

#[test]
fn direct_refuses_clock_moving_backwards() {
    let layout = UidLayout::DEFAULT;
    let generator = DirectUidGenerator::from_components(50, 1, 0, layout, StepTime::at(42));
    assert_eq!(
        generator.try_poll_id(),
        Err(GenerateError::ClockMovedBackwards { refused_secs: 8 })
    );
    assert_eq!(
        generator.try_next_id(),
        Err(GenerateError::ClockMovedBackwards { refused_secs: 8 })
    );
}

#[test]
fn direct_fails_once_timestamp_bits_are_exhausted() {
    let layout = UidLayout::new(10, 40, 13).unwrap();
    let generator = DirectUidGenerator::new(1, layout, StepTime::at(1024));
    assert_eq!(
        generator.try_next_id(),
        Err(GenerateError::TimestampExhausted {
            delta_secs: 1024,
            max: 1023
        })
    );
}

#[test]
fn direct_truncates_oversized_worker_id() {
    let layout = small_layout();
    let generator = DirectUidGenerator::new(layout.max_worker_id() + 2, layout, StepTime::at(1));
    assert_eq!(generator.worker_id(), 1);
}

#[test]
fn direct_ids_unique_across_threads() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 2000;

    let generator = DirectUidGenerator::new(9, UidLayout::DEFAULT, MonotonicClock::default());
    let seen = Mutex::new(HashSet::new());

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let ids: Vec<_> = (0..PER_THREAD)
                    .map(|_| generator.try_next_id().unwrap())
                    .collect();
                assert_strictly_increasing(&ids);
                let mut seen = seen.lock().unwrap();
                for id in ids {
                    assert!(seen.insert(id), "duplicate uid {id}");
                }
            });
        }
    });

    assert_eq!(seen.lock().unwrap().len(), THREADS * PER_THREAD);
}

#[test]
fn direct_slow_clock_reader_does_not_see_time_going_backwards() {
    let layout = UidLayout::DEFAULT;
    let time = Arc::new(StallingTime::at(100));
    let generator = DirectUidGenerator::new(7, layout, Arc::clone(&time));

    scope(|s| {
        let slow = s.spawn(|| generator.try_next_id());
        time.gate.wait();

        // The clock ticks while the first caller still holds second 100.
        time.secs.store(101, Ordering::Release);
        let fast = s.spawn(|| generator.try_next_id());
        thread::sleep(Duration::from_millis(50));
        time.gate.wait();

        let slow = slow.join().unwrap().unwrap();
        let fast = fast.join().unwrap().unwrap();
        assert_eq!(slow, layout.compose(100, 7, 0));
        assert_eq!(fast, layout.compose(101, 7, 0));
    });
}

#[test]
fn buffer_capacity_follows_layout_and_boost() {
    let config = BufferConfig::default();
    assert_eq!(config.capacity(&UidLayout::DEFAULT), Some(8192 << 3));
    assert_eq!(config.threshold(8192 << 3), 8192 << 2);

    let huge = BufferConfig {
        boost_power: 40,
        ..BufferConfig::default()
    };
    assert_eq!(huge.capacity(&UidLayout::DEFAULT), None);
}

#[test]
fn buffered_fills_to_capacity_on_construction() {
    let config = BufferConfig {
        boost_power: 2,
        ..BufferConfig::default()
    };
    let generator = BufferedUidGenerator::new(7, small_layout(), StepTime::at(100), &config).unwrap();

    assert_eq!(generator.capacity(), 64);
    assert_eq!(generator.remaining(), 64);
    assert_eq!(generator.worker_id(), 7);
}

#[test]
fn buffered_serves_increasing_ids_beyond_capacity() {
    let layout = small_layout();
    let config = BufferConfig {
        boost_power: 2,
        ..BufferConfig::default()
    };
    let generator = BufferedUidGenerator::new(7, layout, StepTime::at(100), &config).unwrap();

    let ids: Vec<_> = (0..1000).map(|_| generator.try_next_id().unwrap()).collect();
    assert_strictly_increasing(&ids);

    let first = layout.decompose(ids[0]).unwrap();
    assert_eq!((first.timestamp, first.worker_id, first.sequence), (100, 7, 0));

    // The clock never moved, so later seconds were borrowed from the future.
    let last = layout.decompose(ids[999]).unwrap();
    assert!(last.timestamp >= 100 + 999 / 16);
}

#[test]
fn buffered_ignores_clock_moving_backwards() {
    let layout = small_layout();
    let time = StepTime::at(500);
    let config = BufferConfig {
        boost_power: 1,
        ..BufferConfig::default()
    };
    let generator = BufferedUidGenerator::new(2, layout, Arc::clone(&time), &config).unwrap();

    let before = generator.try_next_id().unwrap();
    time.set(10);
    let after: Vec<_> = (0..200).map(|_| generator.try_next_id().unwrap()).collect();

    assert!(before < after[0]);
    assert_strictly_increasing(&after);
}

#[test]
fn buffered_construction_fails_past_timestamp_range() {
    let layout = UidLayout::new(10, 40, 13).unwrap();
    let result = BufferedUidGenerator::new(1, layout, StepTime::at(2000), &BufferConfig::default());
    assert!(matches!(
        result,
        Err(GenerateError::TimestampExhausted { max: 1023, .. })
    ));
}

#[test]
fn buffered_construction_rejects_oversized_buffer() {
    let layout = UidLayout::new(18, 20, 25).unwrap();
    for boost_power in [0, 3] {
        let config = BufferConfig {
            boost_power,
            ..BufferConfig::default()
        };
        let result = BufferedUidGenerator::new(1, layout, StepTime::at(100), &config);
        assert!(matches!(
            result,
            Err(GenerateError::BufferTooLarge {
                sequence_bits: 25,
                boost_power: b,
                ..
            }) if b == boost_power
        ));
    }
}

#[test]
fn buffered_drains_then_reports_exhaustion() {
    let layout = UidLayout::new(10, 49, 4).unwrap();
    let config = BufferConfig {
        boost_power: 1,
        ..BufferConfig::default()
    };
    let generator = BufferedUidGenerator::new(1, layout, StepTime::at(1020), &config).unwrap();

    let mut issued = Vec::new();
    let err = loop {
        match generator.try_next_id() {
            Ok(uid) => issued.push(uid),
            Err(err) => break err,
        }
    };

    // Seconds 1020..=1023 with 16 sequence values each.
    assert_eq!(issued.len(), 64);
    assert_strictly_increasing(&issued);
    assert!(matches!(err, GenerateError::TimestampExhausted { .. }));
    assert!(generator.try_next_id().is_err());
}

#[test]
fn buffered_padding_interval_keeps_buffer_topped_up() {
    let config = BufferConfig {
        boost_power: 2,
        padding_factor: 10,
        padding_interval: Some(Duration::from_millis(5)),
    };
    let generator = BufferedUidGenerator::new(3, small_layout(), StepTime::at(100), &config).unwrap();

    for _ in 0..40 {
        generator.try_next_id().unwrap();
    }
    // 40 taken leaves 24, above the 10% threshold; only the interval refills.
    let mut refilled = false;
    for _ in 0..200 {
        if generator.remaining() >= 48 {
            refilled = true;
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert!(refilled, "buffer was not padded on schedule");
}

#[test]
fn buffered_ids_unique_across_threads() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 5000;

    let generator = BufferedUidGenerator::new(
        4,
        UidLayout::DEFAULT,
        MonotonicClock::default(),
        &BufferConfig::default(),
    )
    .unwrap();
    let seen = Mutex::new(HashSet::new());

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let ids: Vec<_> = (0..PER_THREAD)
                    .map(|_| generator.try_next_id().unwrap())
                    .collect();
                let mut seen = seen.lock().unwrap();
                for id in ids {
                    assert!(seen.insert(id), "duplicate uid {id}");
                }
            });
        }
    });

    assert_eq!(seen.lock().unwrap().len(), THREADS * PER_THREAD);
}

#[test]
fn buffered_drop_stops_padding_thread() {
    let config = BufferConfig {
        padding_interval: Some(Duration::from_millis(1)),
        ..BufferConfig::default()
    };
    for worker_id in 0..16 {
        let generator =
            BufferedUidGenerator::new(worker_id, small_layout(), StepTime::at(10), &config)
                .unwrap();
        generator.try_next_id().unwrap();
        drop(generator);
    }
}

#[test]
fn decode_resolves_against_epoch() {
    let layout = UidLayout::DEFAULT;
    let generator = DirectUidGenerator::new(77, layout, StepTime::at(3600));
    let uid = generator.try_next_id().unwrap();

    let fields = generator.decode(uid).unwrap();
    assert_eq!(fields.uid, uid);
    assert_eq!(fields.delta_seconds, 3600);
    assert_eq!(fields.timestamp, DEFAULT_EPOCH.as_secs() + 3600);
    assert_eq!(fields.worker_id, 77);
    assert_eq!(fields.sequence, 0);

    assert_eq!(
        generator.decode(u64::MAX),
        Err(GenerateError::MalformedUid { uid: u64::MAX })
    );
}

#[test]
fn handle_builds_each_variant() {
    let layout = small_layout();
    let buffer = BufferConfig::default();

    for variant in [GeneratorVariant::Direct, GeneratorVariant::Buffered] {
        let handle = GeneratorHandle::build(
            "Order",
            WorkerToken::new(11),
            3,
            variant,
            layout,
            StepTime::at(60),
            &buffer,
        )
        .unwrap();

        assert_eq!(handle.domain(), "Order");
        assert_eq!(handle.worker_id(), 11);
        assert_eq!(handle.generation(), 3);
        assert_eq!(handle.variant(), variant);

        let uid = handle.produce().unwrap();
        let fields = handle.decode(uid).unwrap();
        assert_eq!((fields.worker_id, fields.delta_seconds), (11, 60));
    }
}

#[test]
fn variant_parses_aliases() {
    assert_eq!("direct".parse(), Ok(GeneratorVariant::Direct));
    assert_eq!("Default".parse(), Ok(GeneratorVariant::Direct));
    assert_eq!(" buffered ".parse(), Ok(GeneratorVariant::Buffered));
    assert_eq!("CACHED".parse(), Ok(GeneratorVariant::Buffered));
    assert!("ring".parse::<GeneratorVariant>().is_err());
    assert_eq!(GeneratorVariant::Buffered.to_string(), "buffered");
}
