/// Failures raised by a generator while producing or decoding a UID.
///
/// The registry treats any of these as a signal that the generator may be in
/// a bad state: it rebuilds the domain with a fresh worker id and retries the
/// call once.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum GenerateError {
    /// The clock reports a second earlier than the last one used.
    #[error("clock moved backwards, refusing to generate ids for {refused_secs}s")]
    ClockMovedBackwards { refused_secs: u64 },

    /// The seconds elapsed since the epoch no longer fit the timestamp field.
    #[error("timestamp bits exhausted: {delta_secs}s since epoch exceeds {max}s")]
    TimestampExhausted { delta_secs: u64, max: u64 },

    /// The UID cannot have been produced by this layout.
    #[error("uid {uid} is malformed: sign bit is set")]
    MalformedUid { uid: u64 },

    /// The buffer a layout and boost power call for is larger than
    /// [`MAX_BUFFER_CAPACITY`].
    ///
    /// [`MAX_BUFFER_CAPACITY`]: crate::MAX_BUFFER_CAPACITY
    #[error("buffer of {sequence_bits} sequence bits boosted by 2^{boost_power} exceeds {max} uids")]
    BufferTooLarge {
        sequence_bits: u8,
        boost_power: u32,
        max: usize,
    },
}
