use std::collections::HashSet;

use parking_lot::Mutex;
use rand::Rng;

use crate::{AssignError, WorkerIdProvider, WorkerToken};

/// Number of draws attempted before a [`RandomWorkerIdProvider`] gives up.
pub const DEFAULT_RANDOM_ATTEMPTS: usize = 64;

/// Draws worker ids uniformly from `0..=max`, never repeating an id it has
/// already issued.
///
/// Random ids make collisions between independently started processes
/// unlikely without any coordination, as long as `max` is large compared to
/// the number of live generators. Uniqueness is only guaranteed within one
/// provider.
#[derive(Debug)]
pub struct RandomWorkerIdProvider {
    max: u64,
    attempts: usize,
    issued: Mutex<HashSet<u64>>,
}

impl RandomWorkerIdProvider {
    pub fn new(max: u64) -> Self {
        Self::with_attempts(max, DEFAULT_RANDOM_ATTEMPTS)
    }

    pub fn with_attempts(max: u64, attempts: usize) -> Self {
        Self {
            max,
            attempts: attempts.max(1),
            issued: Mutex::new(HashSet::new()),
        }
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> usize {
        self.issued.lock().len()
    }
}

impl WorkerIdProvider for RandomWorkerIdProvider {
    fn assign(&self) -> Result<WorkerToken, AssignError> {
        let mut issued = self.issued.lock();
        let mut rng = rand::rng();

        for _ in 0..self.attempts {
            let id = rng.random_range(0..=self.max);
            if issued.insert(id) {
                return Ok(WorkerToken::new(id));
            }
        }

        Err(AssignError::Exhausted { max: self.max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_stay_in_range_and_unique() {
        let provider = RandomWorkerIdProvider::new(1 << 22);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = provider.assign().unwrap().get();
            assert!(id <= 1 << 22);
            assert!(seen.insert(id));
        }
        assert_eq!(provider.issued(), 1000);
    }

    #[test]
    fn tiny_space_exhausts() {
        let provider = RandomWorkerIdProvider::with_attempts(0, 8);
        assert_eq!(provider.assign().unwrap().get(), 0);
        assert_eq!(provider.assign(), Err(AssignError::Exhausted { max: 0 }));
    }
}
