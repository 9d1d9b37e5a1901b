use crate::{Error, Result, generator::GenerateError};

/// Number of bits available to the unsigned fields of a UID. The top bit of
/// the `u64` is the sign bit and always stays zero.
pub const UID_PAYLOAD_BITS: u8 = 63;

/// Bit allocation of a 64-bit UID.
///
/// - 1 bit sign (always 0)
/// - `timestamp_bits` delta seconds since the clock's epoch
/// - `worker_id_bits` worker id assigned to the generator
/// - `sequence_bits` sequence within one second
///
/// ```text
///  Bit Index:  63     63 62            33 32              13 12            0
///              +--------+----------------+------------------+--------------+
///  Field:      | sign(1)| delta secs (30)|  worker id (20)  | sequence (13)|
///              +--------+----------------+------------------+--------------+
///              |<----------- MSB --------- 64 bits -------- LSB ---------->|
/// ```
///
/// The diagram shows [`UidLayout::DEFAULT`]: 30 bits of seconds cover roughly
/// 34 years from the epoch, 20 bits allow about a million worker ids over the
/// lifetime of a deployment and 13 bits give 8192 ids per second per worker.
/// The classic 28/22/13 split ran out of seconds in late 2024 when anchored
/// at [`DEFAULT_EPOCH`].
///
/// [`DEFAULT_EPOCH`]: crate::DEFAULT_EPOCH
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UidLayout {
    timestamp_bits: u8,
    worker_id_bits: u8,
    sequence_bits: u8,
}

/// The raw fields of a UID, without any epoch applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UidParts {
    pub timestamp: u64,
    pub worker_id: u64,
    pub sequence: u64,
}

impl Default for UidLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl UidLayout {
    /// 30 bits of seconds, 20 bits of worker id, 13 bits of sequence.
    pub const DEFAULT: Self = Self {
        timestamp_bits: 30,
        worker_id_bits: 20,
        sequence_bits: 13,
    };

    /// Creates a layout from explicit field widths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a field is empty or the widths do
    /// not add up to exactly [`UID_PAYLOAD_BITS`].
    pub fn new(timestamp_bits: u8, worker_id_bits: u8, sequence_bits: u8) -> Result<Self> {
        if timestamp_bits == 0 || worker_id_bits == 0 || sequence_bits == 0 {
            return Err(Error::invalid_config(format!(
                "every uid field needs at least one bit (timestamp={timestamp_bits}, worker_id={worker_id_bits}, sequence={sequence_bits})"
            )));
        }

        let allocated =
            u16::from(timestamp_bits) + u16::from(worker_id_bits) + u16::from(sequence_bits);
        if allocated != u16::from(UID_PAYLOAD_BITS) {
            return Err(Error::invalid_config(format!(
                "uid fields must allocate exactly {UID_PAYLOAD_BITS} bits, got {allocated}"
            )));
        }

        Ok(Self {
            timestamp_bits,
            worker_id_bits,
            sequence_bits,
        })
    }

    pub const fn timestamp_bits(&self) -> u8 {
        self.timestamp_bits
    }

    pub const fn worker_id_bits(&self) -> u8 {
        self.worker_id_bits
    }

    pub const fn sequence_bits(&self) -> u8 {
        self.sequence_bits
    }

    /// Largest delta (in seconds) the timestamp field can hold.
    pub const fn max_timestamp(&self) -> u64 {
        mask(self.timestamp_bits)
    }

    /// Largest worker id the layout can encode.
    pub const fn max_worker_id(&self) -> u64 {
        mask(self.worker_id_bits)
    }

    /// Largest sequence value within a single second.
    pub const fn max_sequence(&self) -> u64 {
        mask(self.sequence_bits)
    }

    const fn timestamp_shift(&self) -> u32 {
        (self.worker_id_bits + self.sequence_bits) as u32
    }

    const fn worker_id_shift(&self) -> u32 {
        self.sequence_bits as u32
    }

    /// Packs the three fields into a UID. Out-of-range values are truncated to
    /// their field width.
    pub const fn compose(&self, timestamp: u64, worker_id: u64, sequence: u64) -> u64 {
        let timestamp = (timestamp & self.max_timestamp()) << self.timestamp_shift();
        let worker_id = (worker_id & self.max_worker_id()) << self.worker_id_shift();
        let sequence = sequence & self.max_sequence();
        timestamp | worker_id | sequence
    }

    /// Splits a UID back into its fields.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::MalformedUid`] if the sign bit is set, which
    /// no generator using this layout can ever produce.
    pub const fn decompose(&self, uid: u64) -> core::result::Result<UidParts, GenerateError> {
        if uid >> UID_PAYLOAD_BITS != 0 {
            return Err(GenerateError::MalformedUid { uid });
        }
        Ok(UidParts {
            timestamp: (uid >> self.timestamp_shift()) & self.max_timestamp(),
            worker_id: (uid >> self.worker_id_shift()) & self.max_worker_id(),
            sequence: uid & self.max_sequence(),
        })
    }
}

const fn mask(bits: u8) -> u64 {
    (1 << bits) - 1
}
