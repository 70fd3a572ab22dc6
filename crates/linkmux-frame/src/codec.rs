use bytes::{BufMut, Bytes, BytesMut};

use crate::cobs;
use crate::crc::crc16;
use crate::error::{FrameError, Result};

/// Largest payload a single packet can carry.
pub const PACKET_DATA_MAX_SIZE: usize = 250;
/// Service byte + channel id.
pub const PACKET_HEADER_SIZE: usize = 2;
/// Trailing CRC-16.
pub const PACKET_CRC_SIZE: usize = 2;
/// Header + payload + checksum.
pub const PACKET_MAX_SIZE: usize = PACKET_HEADER_SIZE + PACKET_DATA_MAX_SIZE + PACKET_CRC_SIZE;
/// Delimiter + length byte + COBS body (at most 255 bytes).
pub const FRAME_MAX_SIZE: usize = 2 + 255;

/// Frame boundary marker; COBS guarantees it never appears in the body.
pub const DELIMITER: u8 = 0x00;
/// Highest channel id the wire format can address.
pub const CHANNEL_MAX: u8 = 22;
/// Channel id reserved for flow-control heartbeats.
pub const HEARTBEAT_CHANNEL: u8 = 0;
/// Highest advertisable flow window.
pub const WINDOW_MAX: u8 = 15;

const WINDOW_MASK: u8 = 0x0F;

/// A decoded packet. Transient: built and consumed within one pump
/// iteration, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The sender's advertised receive window (0..=15).
    pub window: u8,
    /// Destination channel; 0 marks a flow-control heartbeat.
    pub channel: u8,
    /// The payload bytes.
    pub payload: Bytes,
}

impl Packet {
    /// Whether this is a pure flow-control heartbeat.
    pub fn is_heartbeat(&self) -> bool {
        self.channel == HEARTBEAT_CHANNEL && self.payload.is_empty()
    }
}

/// Append a big-endian CRC-16 over the current contents of `packet`.
pub fn append_crc(packet: &mut BytesMut) {
    let crc = crc16(packet);
    packet.put_u8((crc >> 8) as u8);
    packet.put_u8(crc as u8);
}

/// Encode a checksummed packet into the wire frame format, replacing the
/// contents of `dst`.
///
/// An oversized `packet` is a contract violation by the caller, reported as
/// [`FrameError::PayloadTooLarge`].
pub fn encode_frame(packet: &[u8], dst: &mut BytesMut) -> Result<()> {
    if packet.len() > PACKET_MAX_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: packet.len(),
            max: PACKET_MAX_SIZE,
        });
    }

    dst.clear();
    dst.reserve(FRAME_MAX_SIZE);
    dst.put_u8(DELIMITER);
    let len_idx = dst.len();
    dst.put_u8(0);
    cobs::encode(packet, dst);

    let body_len = dst.len() - len_idx - 1;
    debug_assert!(body_len <= 255);
    dst[len_idx] = body_len as u8;
    Ok(())
}

/// Build, checksum and frame a packet in one step, replacing the contents
/// of `dst` with the wire bytes. This is what the sink pump transmits.
pub fn encode(window: u8, channel: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > PACKET_DATA_MAX_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: PACKET_DATA_MAX_SIZE,
        });
    }
    if channel > CHANNEL_MAX {
        return Err(FrameError::InvalidChannel(channel));
    }

    let mut packet = BytesMut::with_capacity(PACKET_MAX_SIZE);
    packet.put_u8(window & WINDOW_MASK);
    packet.put_u8(channel);
    packet.put_slice(payload);
    append_crc(&mut packet);
    encode_frame(&packet, dst)
}

/// Decode the COBS body of one frame (delimiter and length byte already
/// stripped by the [`Deframer`](crate::deframe::Deframer)) back into a
/// validated [`Packet`].
pub fn decode_frame(body: &[u8]) -> Result<Packet> {
    let mut decoded = BytesMut::with_capacity(body.len());
    cobs::decode(body, &mut decoded)?;

    if decoded.len() < PACKET_HEADER_SIZE + PACKET_CRC_SIZE {
        return Err(FrameError::Truncated { len: decoded.len() });
    }
    // Checksum covers service byte, channel id and payload; a packet with
    // its checksum appended re-CRCs to zero.
    if crc16(&decoded) != 0 {
        return Err(FrameError::ChecksumMismatch);
    }

    let service = decoded[0];
    if service & !WINDOW_MASK != 0 {
        return Err(FrameError::ReservedServiceBits(service));
    }
    let channel = decoded[1];
    if channel > CHANNEL_MAX {
        return Err(FrameError::InvalidChannel(channel));
    }

    let payload_end = decoded.len() - PACKET_CRC_SIZE;
    let payload = decoded.freeze().slice(PACKET_HEADER_SIZE..payload_end);
    Ok(Packet {
        window: service & WINDOW_MASK,
        channel,
        payload,
    })
}
