use parking_lot::{Condvar, Mutex};
use portable_atomic::{AtomicBool, Ordering};

/// Single-writer gate around a registry refresh.
///
/// At most one refresh holds the gate at a time; other refreshes and lookups
/// park on a condition variable until it is released instead of spinning.
/// `active` mirrors the mutex-guarded flag so that lookups can skip the mutex
/// when no refresh is running.
pub(crate) struct RefreshGate {
    active: AtomicBool,
    refreshing: Mutex<bool>,
    settled: Condvar,
}

/// Proof of holding the [`RefreshGate`]. Dropping it reopens the gate and
/// wakes every waiter, whether the refresh succeeded or not.
pub(crate) struct RefreshTicket<'a> {
    gate: &'a RefreshGate,
}

impl RefreshGate {
    pub(crate) fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            refreshing: Mutex::new(false),
            settled: Condvar::new(),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Blocks until no refresh is in progress.
    pub(crate) fn wait_settled(&self) {
        if !self.is_active() {
            return;
        }
        let mut refreshing = self.refreshing.lock();
        while *refreshing {
            self.settled.wait(&mut refreshing);
        }
    }

    /// Blocks until the gate is free, then takes it.
    pub(crate) fn enter(&self) -> RefreshTicket<'_> {
        let mut refreshing = self.refreshing.lock();
        while *refreshing {
            #[cfg(feature = "tracing")]
            tracing::debug!("another refresh is in progress, waiting");
            self.settled.wait(&mut refreshing);
        }
        *refreshing = true;
        self.active.store(true, Ordering::Release);
        RefreshTicket { gate: self }
    }
}

impl Drop for RefreshTicket<'_> {
    fn drop(&mut self) {
        let mut refreshing = self.gate.refreshing.lock();
        *refreshing = false;
        self.gate.active.store(false, Ordering::Release);
        drop(refreshing);
        self.gate.settled.notify_all();
    }
}
