use core::fmt;
use std::sync::Arc;

use crate::AssignError;

/// A worker id leased for exactly one generator instance.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerToken(u64);

impl WorkerToken {
    pub const fn new(worker_id: u64) -> Self {
        Self(worker_id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for WorkerToken {
    fn from(worker_id: u64) -> Self {
        Self(worker_id)
    }
}

impl fmt::Display for WorkerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supplies worker ids that are unique among all live generators.
///
/// Implementations are typically backed by an external coordination service
/// (a database sequence, a coordination tree, ...). The registry calls
/// [`WorkerIdProvider::assign`] while holding its build lock, so an
/// implementation must never call back into the registry.
///
/// # Example
///
/// ```
/// use zsid::{AssignError, WorkerIdProvider, WorkerToken};
///
/// struct Fixed(u64);
/// impl WorkerIdProvider for Fixed {
///     fn assign(&self) -> Result<WorkerToken, AssignError> {
///         Ok(WorkerToken::new(self.0))
///     }
/// }
///
/// assert_eq!(Fixed(7).assign().unwrap().get(), 7);
/// ```
pub trait WorkerIdProvider: Send + Sync {
    /// Leases a new worker id.
    ///
    /// # Errors
    ///
    /// Returns an [`AssignError`] if no id could be leased.
    fn assign(&self) -> Result<WorkerToken, AssignError>;
}

impl<P: WorkerIdProvider + ?Sized> WorkerIdProvider for Arc<P> {
    fn assign(&self) -> Result<WorkerToken, AssignError> {
        (**self).assign()
    }
}

impl<P: WorkerIdProvider + ?Sized> WorkerIdProvider for Box<P> {
    fn assign(&self) -> Result<WorkerToken, AssignError> {
        (**self).assign()
    }
}
