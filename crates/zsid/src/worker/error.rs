use core::time::Duration;

/// Failures of a [`WorkerIdProvider`].
///
/// The registry never retries these; they propagate unchanged out of the
/// build that requested the token.
///
/// [`WorkerIdProvider`]: crate::WorkerIdProvider
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AssignError {
    /// Every worker id the provider may hand out is taken.
    #[error("worker id space exhausted (max = {max})")]
    Exhausted { max: u64 },

    /// The coordination service backing the provider could not be reached.
    #[error("coordination service unavailable: {reason}")]
    Unavailable { reason: String },

    /// The provider did not answer within its deadline.
    #[error("worker id assignment timed out after {0:?}")]
    TimedOut(Duration),

    /// The provider returned an id that the uid layout cannot encode.
    #[error("worker id {id} exceeds the layout maximum of {max}")]
    OutOfRange { id: u64, max: u64 },
}

impl AssignError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}
