/// Represents the result of attempting to generate a new UID.
///
/// This type models the outcome of [`DirectUidGenerator::try_poll_id`]:
///
/// - [`IdGenStatus::Ready`] indicates a new UID was successfully generated.
/// - [`IdGenStatus::Pending`] means the sequence for the current second is
///   exhausted and no UID can be produced for `yield_for` more seconds.
///
/// This allows non-blocking generation loops and clean backoff strategies.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use zsid::{DirectUidGenerator, IdGenStatus, TimeSource, UidLayout};
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_secs(&self) -> u64 {
///         1
///     }
///
///     fn epoch(&self) -> Duration {
///         Duration::ZERO
///     }
/// }
///
/// let generator = DirectUidGenerator::new(7, UidLayout::DEFAULT, FixedTime);
/// match generator.try_poll_id().unwrap() {
///     IdGenStatus::Ready { id } => println!("UID: {id}"),
///     IdGenStatus::Pending { yield_for } => println!("Back off for {yield_for}s"),
/// }
/// ```
///
/// [`DirectUidGenerator::try_poll_id`]: crate::DirectUidGenerator::try_poll_id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGenStatus {
    /// A unique UID was generated and is ready to use.
    Ready {
        /// The generated UID.
        id: u64,
    },
    /// No UID could be generated because the sequence has been exhausted for
    /// the current second.
    Pending {
        /// Seconds to wait before trying again.
        yield_for: u64,
    },
}
