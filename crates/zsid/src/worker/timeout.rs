use core::time::Duration;
use std::{
    sync::{
        Arc,
        mpsc::{self, RecvTimeoutError},
    },
    thread,
};

use crate::{AssignError, WorkerIdProvider, WorkerToken};

/// Bounds every [`WorkerIdProvider::assign`] call of the wrapped provider.
///
/// The inner call runs on a helper thread. If it has not answered after
/// `timeout`, [`AssignError::TimedOut`] is returned and the eventual answer is
/// discarded; with a disposable provider this leaks one worker id.
///
/// The registry calls providers while holding its build lock, so without a
/// bound a stuck coordination service would stall every build and refresh.
#[derive(Debug)]
pub struct TimeoutWorkerIdProvider<P> {
    inner: Arc<P>,
    timeout: Duration,
}

impl<P> TimeoutWorkerIdProvider<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self::from_shared(Arc::new(inner), timeout)
    }

    pub const fn from_shared(inner: Arc<P>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P> WorkerIdProvider for TimeoutWorkerIdProvider<P>
where
    P: WorkerIdProvider + 'static,
{
    fn assign(&self) -> Result<WorkerToken, AssignError> {
        let (tx, rx) = mpsc::sync_channel(1);
        let inner = Arc::clone(&self.inner);

        thread::Builder::new()
            .name("zsid-assign".to_owned())
            .spawn(move || {
                // The receiver is gone once the caller timed out.
                let _ = tx.send(inner.assign());
            })
            .map_err(|e| AssignError::unavailable(format!("failed to spawn assign thread: {e}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(timeout = ?self.timeout, "worker id assignment timed out");
                Err(AssignError::TimedOut(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(AssignError::unavailable(
                "worker id provider exited without answering",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SequentialWorkerIdProvider;

    struct Stuck(Duration);

    impl WorkerIdProvider for Stuck {
        fn assign(&self) -> Result<WorkerToken, AssignError> {
            thread::sleep(self.0);
            Ok(WorkerToken::new(1))
        }
    }

    struct Panicking;

    impl WorkerIdProvider for Panicking {
        fn assign(&self) -> Result<WorkerToken, AssignError> {
            panic!("coordination client crashed");
        }
    }

    #[test]
    fn passes_through_fast_answers() {
        let provider =
            TimeoutWorkerIdProvider::new(SequentialWorkerIdProvider::new(3, 10), Duration::from_secs(5));
        assert_eq!(provider.assign().unwrap().get(), 3);
        assert_eq!(provider.assign().unwrap().get(), 4);
        assert_eq!(provider.inner().peek(), 5);
    }

    #[test]
    fn passes_through_inner_errors() {
        let provider =
            TimeoutWorkerIdProvider::new(SequentialWorkerIdProvider::new(1, 0), Duration::from_secs(5));
        assert_eq!(provider.assign(), Err(AssignError::Exhausted { max: 0 }));
    }

    #[test]
    fn times_out_slow_provider() {
        let timeout = Duration::from_millis(20);
        let provider = TimeoutWorkerIdProvider::new(Stuck(Duration::from_millis(500)), timeout);
        assert_eq!(provider.assign(), Err(AssignError::TimedOut(timeout)));
    }

    #[test]
    fn reports_crashed_provider_as_unavailable() {
        let provider = TimeoutWorkerIdProvider::new(Panicking, Duration::from_secs(5));
        assert!(matches!(
            provider.assign(),
            Err(AssignError::Unavailable { .. })
        ));
    }
}
