use core::fmt;

use crate::UidParts;

/// A decoded UID, with its timestamp resolved against the generator's epoch.
///
/// `Display` renders the fields in a single line; enable the `serde` feature
/// to serialize them (e.g. as JSON for logs or HTTP responses).
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UidFields {
    /// The UID that was decoded.
    pub uid: u64,
    /// Seconds since the Unix epoch at which the UID was issued.
    pub timestamp: u64,
    /// Seconds since the generator's epoch, as stored in the UID.
    pub delta_seconds: u64,
    /// Worker id of the generator that issued the UID.
    pub worker_id: u64,
    /// Sequence within the issuing second.
    pub sequence: u64,
}

impl UidFields {
    pub(crate) const fn from_parts(uid: u64, parts: UidParts, epoch_secs: u64) -> Self {
        Self {
            uid,
            timestamp: epoch_secs.saturating_add(parts.timestamp),
            delta_seconds: parts.timestamp,
            worker_id: parts.worker_id,
            sequence: parts.sequence,
        }
    }
}

impl fmt::Display for UidFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uid={} timestamp={} worker_id={} sequence={}",
            self.uid, self.timestamp, self.worker_id, self.sequence
        )
    }
}
