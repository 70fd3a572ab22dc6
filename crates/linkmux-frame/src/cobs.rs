//! COBS byte stuffing.
//!
//! Removes every zero byte from a packet so that 0x00 can unambiguously mark
//! frame boundaries on the wire. Worst-case overhead is one byte per 254
//! bytes of input, so a full 254-byte packet encodes to at most 255 bytes
//! and always fits the single-byte frame length field.

use bytes::{BufMut, BytesMut};

/// Largest run of non-zero bytes a single group can carry.
const MAX_GROUP: u8 = 0xFF;

/// Errors the COBS decoder can report.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CobsError {
    /// A zero byte appeared inside the encoded data.
    #[error("zero byte inside encoded data")]
    UnexpectedZero,

    /// A group's code points past the end of the input.
    #[error("group extends past end of input")]
    Truncated,
}

/// Append the COBS encoding of `src` to `dst`.
pub fn encode(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(src.len() + src.len() / 254 + 1);

    let mut code_idx = dst.len();
    dst.put_u8(0);
    let mut code: u8 = 1;

    for &byte in src {
        if code == MAX_GROUP {
            dst[code_idx] = code;
            code_idx = dst.len();
            dst.put_u8(0);
            code = 1;
        }
        if byte == 0 {
            dst[code_idx] = code;
            code_idx = dst.len();
            dst.put_u8(0);
            code = 1;
        } else {
            dst.put_u8(byte);
            code += 1;
        }
    }

    dst[code_idx] = code;
}

/// Append the decoding of `src` to `dst`.
pub fn decode(src: &[u8], dst: &mut BytesMut) -> Result<(), CobsError> {
    dst.reserve(src.len());

    let mut pos = 0usize;
    while pos < src.len() {
        let code = src[pos];
        if code == 0 {
            return Err(CobsError::UnexpectedZero);
        }
        let end = pos + code as usize;
        if end > src.len() {
            return Err(CobsError::Truncated);
        }
        for &byte in &src[pos + 1..end] {
            if byte == 0 {
                return Err(CobsError::UnexpectedZero);
            }
            dst.put_u8(byte);
        }
        pos = end;
        if code != MAX_GROUP && pos < src.len() {
            dst.put_u8(0);
        }
    }
    Ok(())
}
