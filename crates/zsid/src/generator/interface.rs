use crate::{GenerateError, TimeSource, UidFields, UidLayout};

/// The capability set every generator variant exposes to the registry.
pub trait UidGenerator: Send + Sync {
    /// The worker id embedded into every UID this generator issues.
    fn worker_id(&self) -> u64;

    /// The bit layout of the UIDs this generator issues.
    fn layout(&self) -> UidLayout;

    /// Produces the next UID, waiting out an exhausted sequence if needed.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerateError`] if the generator cannot issue a UID that is
    /// guaranteed unique, e.g. the clock moved backwards or the timestamp
    /// field is exhausted.
    fn try_next_id(&self) -> Result<u64, GenerateError>;

    /// Decodes a UID issued under the same layout and epoch.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::MalformedUid`] if the UID could not have been
    /// produced by this layout.
    fn decode(&self, uid: u64) -> Result<UidFields, GenerateError>;
}

pub(crate) fn decode_with<T: TimeSource>(
    layout: &UidLayout,
    time: &T,
    uid: u64,
) -> Result<UidFields, GenerateError> {
    let parts = layout.decompose(uid)?;
    Ok(UidFields::from_parts(uid, parts, time.epoch().as_secs()))
}

pub(crate) fn check_timestamp(layout: &UidLayout, delta_secs: u64) -> Result<u64, GenerateError> {
    let max = layout.max_timestamp();
    if delta_secs > max {
        return Err(GenerateError::TimestampExhausted { delta_secs, max });
    }
    Ok(delta_secs)
}
