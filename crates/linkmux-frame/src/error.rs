use crate::cobs::CobsError;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the fixed packet data size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The COBS layer rejected the frame body.
    #[error("malformed frame: {0}")]
    Cobs(#[from] CobsError),

    /// The decoded packet is smaller than header plus checksum.
    #[error("decoded packet too short ({len} bytes)")]
    Truncated { len: usize },

    /// The trailing CRC-16 did not validate.
    #[error("packet checksum mismatch")]
    ChecksumMismatch,

    /// Reserved service-byte bits were nonzero.
    #[error("reserved service bits set (0x{0:02x})")]
    ReservedServiceBits(u8),

    /// The channel id is outside the wire range 0..=22.
    #[error("channel id {0} outside wire range")]
    InvalidChannel(u8),
}

pub type Result<T> = std::result::Result<T, FrameError>;
