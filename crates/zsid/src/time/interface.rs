use core::time::Duration;
use std::sync::Arc;

/// Default epoch: Friday, May 20, 2016 00:00:00 UTC
pub const DEFAULT_EPOCH: Duration = Duration::from_secs(1_463_702_400);

/// A trait for time sources that return whole seconds elapsed since an epoch.
///
/// This abstraction allows you to plug in the wall clock, a monotonic timer,
/// or a mocked time source in tests.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use zsid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_secs(&self) -> u64 {
///         1234
///     }
///
///     fn epoch(&self) -> Duration {
///         Duration::ZERO
///     }
/// }
///
/// assert_eq!(FixedTime.current_secs(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the number of whole seconds elapsed since [`Self::epoch`].
    fn current_secs(&self) -> u64;

    /// The origin (t = 0) of this source, as a duration since 1970-01-01 UTC.
    fn epoch(&self) -> Duration;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_secs(&self) -> u64 {
        (**self).current_secs()
    }

    fn epoch(&self) -> Duration {
        (**self).epoch()
    }
}
