use portable_atomic::{AtomicU64, Ordering};

use crate::{AssignError, WorkerIdProvider, WorkerToken};

/// Hands out disposable worker ids in increasing order.
///
/// Every call consumes a new id and ids are never returned, mirroring a
/// database auto-increment column used as a worker id source. Once `max` has
/// been handed out, [`AssignError::Exhausted`] is returned.
///
/// Suitable for a single process, or for several processes that were given
/// disjoint `[start, max]` ranges.
#[derive(Debug)]
pub struct SequentialWorkerIdProvider {
    next: AtomicU64,
    max: u64,
}

impl SequentialWorkerIdProvider {
    pub const fn new(start: u64, max: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
            max,
        }
    }

    /// The id the next successful [`WorkerIdProvider::assign`] will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl WorkerIdProvider for SequentialWorkerIdProvider {
    fn assign(&self) -> Result<WorkerToken, AssignError> {
        let max = self.max;
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| {
                if next <= max { next.checked_add(1) } else { None }
            })
            .map(WorkerToken::new)
            .map_err(|_| AssignError::Exhausted { max })
    }
}
