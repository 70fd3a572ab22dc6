use bytes::{BufMut, BytesMut};
use tracing::warn;

use crate::codec::{decode_frame, Packet, DELIMITER, FRAME_MAX_SIZE};

/// Incremental frame reassembly.
///
/// Feed raw link bytes in arbitrary chunks; complete, validated packets are
/// handed to the caller's closure. Malformed frames are dropped, logged and
/// counted. A delimiter byte in any state abandons whatever was in flight —
/// the stream self-synchronises on the next frame boundary.
#[derive(Debug)]
pub struct Deframer {
    state: State,
    buf: BytesMut,
    malformed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitDelimiter,
    AwaitLength,
    Copying { remaining: usize },
}

impl Deframer {
    pub fn new() -> Self {
        Self {
            state: State::AwaitDelimiter,
            buf: BytesMut::with_capacity(FRAME_MAX_SIZE),
            malformed: 0,
        }
    }

    /// Consume a chunk of link bytes, delivering each completed packet.
    pub fn push(&mut self, chunk: &[u8], mut deliver: impl FnMut(Packet)) {
        for &byte in chunk {
            if byte == DELIMITER {
                // Self-synchronising: a fresh delimiter always restarts
                // reassembly, abandoning any partial frame.
                self.state = State::AwaitLength;
                continue;
            }
            match self.state {
                State::AwaitDelimiter => {}
                State::AwaitLength => {
                    self.buf.clear();
                    self.state = State::Copying {
                        remaining: byte as usize,
                    };
                }
                State::Copying { remaining } => {
                    self.buf.put_u8(byte);
                    if remaining > 1 {
                        self.state = State::Copying {
                            remaining: remaining - 1,
                        };
                        continue;
                    }
                    self.state = State::AwaitDelimiter;
                    match decode_frame(&self.buf) {
                        Ok(packet) => deliver(packet),
                        Err(err) => {
                            self.malformed += 1;
                            warn!(error = %err, "dropping malformed frame");
                        }
                    }
                }
            }
        }
    }

    /// How many frames have been dropped as malformed so far.
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }
}

impl Default for Deframer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    fn wire(window: u8, channel: u8, payload: &[u8]) -> Vec<u8> {
        let mut dst = BytesMut::new();
        encode(window, channel, payload, &mut dst).unwrap();
        dst.to_vec()
    }

    fn collect(deframer: &mut Deframer, stream: &[u8], chunk_size: usize) -> Vec<Packet> {
        let mut packets = Vec::new();
        for chunk in stream.chunks(chunk_size.max(1)) {
            deframer.push(chunk, |p| packets.push(p));
        }
        packets
    }

    #[test]
    fn single_frame_delivered() {
        let stream = wire(1, 2, b"hello");
        let mut deframer = Deframer::new();
        let packets = collect(&mut deframer, &stream, stream.len());
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].channel, 2);
        assert_eq!(packets[0].payload.as_ref(), b"hello");
        assert_eq!(deframer.malformed_count(), 0);
    }

    #[test]
    fn self_synchronises_through_filler() {
        // Two valid frames with non-zero filler injected between them, fed
        // at every chunk granularity down to one byte at a time.
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0xAA, 0xBB]); // leading noise
        stream.extend_from_slice(&wire(0, 2, b"first"));
        stream.extend_from_slice(&[0x55, 0x66, 0x77]); // inter-frame filler
        stream.extend_from_slice(&wire(0, 3, b"second"));

        for chunk_size in 1..=stream.len() {
            let mut deframer = Deframer::new();
            let packets = collect(&mut deframer, &stream, chunk_size);
            assert_eq!(packets.len(), 2, "chunk size {chunk_size}");
            assert_eq!(packets[0].payload.as_ref(), b"first");
            assert_eq!(packets[1].payload.as_ref(), b"second");
        }
    }

    #[test]
    fn truncated_frame_abandoned_on_next_delimiter() {
        let good = wire(0, 1, b"intact");
        let mut stream = wire(0, 1, b"cut short");
        stream.truncate(stream.len() - 3);
        stream.extend_from_slice(&good);

        let mut deframer = Deframer::new();
        let packets = collect(&mut deframer, &stream, 1);
        // The truncated frame promised more bytes than arrive before the
        // next delimiter; the delimiter abandons the partial body without a
        // decode attempt and the following frame comes through intact.
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload.as_ref(), b"intact");
        assert_eq!(deframer.malformed_count(), 0);
    }

    #[test]
    fn zero_length_frame_ignored() {
        // Delimiter followed by delimiter: degenerate frame, no delivery.
        let mut stream = vec![0x00, 0x00];
        stream.extend_from_slice(&wire(0, 4, b"after"));

        let mut deframer = Deframer::new();
        let packets = collect(&mut deframer, &stream, stream.len());
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].channel, 4);
        assert_eq!(deframer.malformed_count(), 0);
    }

    #[test]
    fn corrupted_frame_counted_not_delivered() {
        let mut bad = wire(0, 2, b"payload");
        // Flip a payload byte inside the COBS body; stays non-zero so the
        // frame structure is intact and the checksum must catch it.
        bad[6] ^= 0x40;
        let good = wire(0, 2, b"payload");

        let mut deframer = Deframer::new();
        let mut stream = bad;
        stream.extend_from_slice(&good);
        let packets = collect(&mut deframer, &stream, 7);

        assert_eq!(packets.len(), 1);
        assert_eq!(deframer.malformed_count(), 1);
    }

    #[test]
    fn garbage_before_any_delimiter_is_ignored() {
        let mut stream = vec![0x42u8; 64];
        stream.extend_from_slice(&wire(5, 1, b"ok"));

        let mut deframer = Deframer::new();
        let packets = collect(&mut deframer, &stream, 5);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].window, 5);
    }
}
