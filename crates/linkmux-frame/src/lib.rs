//! Wire codec for the linkmux serial multiplexer.
//!
//! Everything here is stateless except the [`Deframer`], which incrementally
//! reassembles frames from a raw byte stream. The wire format is fixed; both
//! ends of the link must be built against the identical version:
//!
//! ```text
//! Frame:   0x00 <len:1> <cobs(packet):len>
//! Packet:  <service:1> <channel:1> <payload:0..250> <crc16:2 big-endian>
//! ```
//!
//! The service byte's low 4 bits carry the sender's advertised receive
//! window; the high 4 bits are reserved and must be zero. Channel 0 is
//! reserved for flow-control heartbeats.

pub mod cobs;
pub mod codec;
pub mod crc;
pub mod deframe;
pub mod error;

pub use codec::{
    append_crc, decode_frame, encode, encode_frame, Packet, CHANNEL_MAX, DELIMITER, FRAME_MAX_SIZE,
    HEARTBEAT_CHANNEL, PACKET_CRC_SIZE, PACKET_DATA_MAX_SIZE, PACKET_HEADER_SIZE, PACKET_MAX_SIZE,
    WINDOW_MAX,
};
pub use crc::crc16;
pub use deframe::Deframer;
pub use error::{FrameError, Result};
