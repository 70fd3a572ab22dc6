//! In-memory loopback link.
//!
//! Two [`LinkPort`]s joined by a pair of bounded byte pipes, one per
//! direction. Each pipe models the receive buffer of the port that reads
//! from it, so occupancy and capacity are exact — which makes flow-window
//! behaviour deterministic in tests.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::port::LinkPort;

/// Create a connected loopback pair; each direction holds at most
/// `capacity` bytes in flight.
pub fn loopback(capacity: usize) -> (LinkPort, LinkPort) {
    let ab = Arc::new(Pipe::new(capacity));
    let ba = Arc::new(Pipe::new(capacity));
    let a = MemPort {
        tx: Arc::clone(&ab),
        rx: Arc::clone(&ba),
    };
    let b = MemPort { tx: ba, rx: ab };
    (LinkPort::from_mem(a), LinkPort::from_mem(b))
}

#[derive(Clone)]
pub(crate) struct MemPort {
    tx: Arc<Pipe>,
    rx: Arc<Pipe>,
}

impl MemPort {
    pub(crate) fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize> {
        Ok(self.rx.read(buf, timeout))
    }

    pub(crate) fn write_all(&self, buf: &[u8]) -> std::io::Result<()> {
        self.tx.write(buf);
        Ok(())
    }

    pub(crate) fn rx_buffered(&self) -> usize {
        self.rx.len()
    }

    pub(crate) fn rx_capacity(&self) -> usize {
        self.rx.capacity
    }
}

/// One direction of the loopback: a bounded byte ring.
struct Pipe {
    buf: Mutex<VecDeque<u8>>,
    capacity: usize,
    readable: Condvar,
    writable: Condvar,
}

impl Pipe {
    fn new(capacity: usize) -> Self {
        Self {
            buf: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            readable: Condvar::new(),
            writable: Condvar::new(),
        }
    }

    fn len(&self) -> usize {
        self.buf.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Append every byte, blocking while the ring is full. Models a serial
    /// transmitter that stalls the writer when the peer does not drain.
    fn write(&self, data: &[u8]) {
        let mut remaining = data;
        let mut guard = match self.buf.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        while !remaining.is_empty() {
            while guard.len() < self.capacity && !remaining.is_empty() {
                let room = self.capacity - guard.len();
                let take = room.min(remaining.len());
                guard.extend(&remaining[..take]);
                remaining = &remaining[take..];
            }
            self.readable.notify_all();
            if remaining.is_empty() {
                break;
            }
            guard = match self.writable.wait(guard) {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Pop up to `buf.len()` bytes, waiting at most `timeout` for the first
    /// one. Returns 0 on timeout.
    fn read(&self, buf: &mut [u8], timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut guard = match self.buf.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        while guard.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return 0;
            }
            let (g, result) = match self.readable.wait_timeout(guard, deadline - now) {
                Ok(pair) => pair,
                Err(poisoned) => {
                    let pair = poisoned.into_inner();
                    (pair.0, pair.1)
                }
            };
            guard = g;
            if result.timed_out() && guard.is_empty() {
                return 0;
            }
        }

        let n = guard.len().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            // Non-empty by the loop above; n is bounded by guard.len().
            *slot = guard.pop_front().unwrap_or_default();
        }
        self.writable.notify_all();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_directions_are_independent() {
        let (mut a, mut b) = loopback(32);
        a.write_link(b"to-b").unwrap();
        b.write_link(b"to-a").unwrap();

        let mut buf = [0u8; 8];
        let n = b.read_link(&mut buf, Duration::from_secs(1)).unwrap();
        assert_eq!(&buf[..n], b"to-b");
        let n = a.read_link(&mut buf, Duration::from_secs(1)).unwrap();
        assert_eq!(&buf[..n], b"to-a");
    }

    #[test]
    fn writer_blocks_until_reader_drains() {
        let (mut a, mut b) = loopback(4);

        let writer = std::thread::spawn(move || {
            // 8 bytes through a 4-byte pipe; completes only if the reader
            // keeps draining.
            a.write_link(b"12345678").unwrap();
        });

        let mut collected = Vec::new();
        let mut buf = [0u8; 4];
        while collected.len() < 8 {
            let n = b.read_link(&mut buf, Duration::from_secs(2)).unwrap();
            assert!(n > 0, "reader starved");
            collected.extend_from_slice(&buf[..n]);
        }
        writer.join().unwrap();
        assert_eq!(collected, b"12345678");
    }

    #[test]
    fn occupancy_never_exceeds_capacity() {
        let (mut a, b) = loopback(16);
        let writer = std::thread::spawn(move || {
            a.write_link(&[7u8; 64]).unwrap();
        });

        let mut drained = 0usize;
        let mut port = b;
        let mut buf = [0u8; 8];
        while drained < 64 {
            assert!(port.rx_buffered() <= port.rx_capacity());
            drained += port.read_link(&mut buf, Duration::from_secs(2)).unwrap();
        }
        writer.join().unwrap();
    }
}
