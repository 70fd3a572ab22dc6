use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Bounded FIFO byte buffer backing one channel.
///
/// Strict single-producer/single-consumer discipline: exactly one side ever
/// appends and the other ever removes. That discipline, not a wider lock, is
/// what keeps the design race-free — the internal mutex only protects the
/// deque itself and is held briefly.
///
/// A `None` timeout means block forever; that is the deliberate default for
/// this system and also the one place where a non-draining consumer can
/// stall its producer.
#[derive(Debug)]
pub struct ByteQueue {
    inner: Mutex<VecDeque<u8>>,
    capacity: usize,
    readable: Condvar,
    writable: Condvar,
}

impl ByteQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            readable: Condvar::new(),
            writable: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Free space currently available to the producer.
    pub fn free(&self) -> usize {
        self.capacity - self.lock().len()
    }

    /// Append `data`, blocking while the buffer is full, up to `timeout`.
    ///
    /// Returns how many bytes were queued; short counts only happen on
    /// timeout. Partial progress is kept — queued bytes stay queued.
    pub fn write(&self, data: &[u8], timeout: Option<Duration>) -> usize {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut written = 0usize;
        let mut guard = self.lock();

        while written < data.len() {
            let room = self.capacity - guard.len();
            if room > 0 {
                let take = room.min(data.len() - written);
                guard.extend(&data[written..written + take]);
                written += take;
                self.readable.notify_all();
                continue;
            }
            match self.wait(&self.writable, guard, deadline) {
                Some(g) => guard = g,
                None => break,
            }
        }
        written
    }

    /// Remove up to `buf.len()` bytes, waiting for at least one.
    pub fn read(&self, buf: &mut [u8], timeout: Option<Duration>) -> usize {
        self.read_at_least(buf, 1, timeout)
    }

    /// Remove up to `buf.len()` bytes, waiting until at least `at_least`
    /// are buffered (bounded by `timeout`), then opportunistically taking
    /// whatever else is already there without further waiting.
    ///
    /// On timeout, whatever is buffered (possibly nothing) is returned.
    pub fn read_at_least(
        &self,
        buf: &mut [u8],
        at_least: usize,
        timeout: Option<Duration>,
    ) -> usize {
        let deadline = timeout.map(|t| Instant::now() + t);
        let threshold = at_least.clamp(1, buf.len().max(1));
        let mut guard = self.lock();

        while guard.len() < threshold {
            match self.wait(&self.readable, guard, deadline) {
                Some(g) => guard = g,
                None => {
                    guard = self.lock();
                    break;
                }
            }
        }
        self.pop_into(&mut guard, buf)
    }

    /// Non-blocking drain used by the sink pump: takes what is there, never
    /// waits.
    pub fn drain_into(&self, buf: &mut [u8]) -> usize {
        let mut guard = self.lock();
        self.pop_into(&mut guard, buf)
    }

    /// Discard all buffered content without delivering it anywhere.
    pub fn clear(&self) {
        let mut guard = self.lock();
        guard.clear();
        self.writable.notify_all();
    }

    /// Wait until the consumer has drained everything. Used to flush a sink
    /// channel before shutdown; returns false on timeout.
    pub fn wait_empty(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.lock();
        while !guard.is_empty() {
            match self.wait(&self.writable, guard, deadline) {
                Some(g) => guard = g,
                None => return false,
            }
        }
        true
    }

    fn pop_into(&self, guard: &mut MutexGuard<'_, VecDeque<u8>>, buf: &mut [u8]) -> usize {
        let n = guard.len().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = guard.pop_front().unwrap_or_default();
        }
        if n > 0 {
            self.writable.notify_all();
        }
        n
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u8>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Wait on `condvar` until notified or the deadline passes. Returns
    /// `None` once the deadline is reached.
    fn wait<'a>(
        &self,
        condvar: &Condvar,
        guard: MutexGuard<'a, VecDeque<u8>>,
        deadline: Option<Instant>,
    ) -> Option<MutexGuard<'a, VecDeque<u8>>> {
        match deadline {
            None => match condvar.wait(guard) {
                Ok(g) => Some(g),
                Err(poisoned) => Some(poisoned.into_inner()),
            },
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return None;
                }
                let (g, result) = match condvar.wait_timeout(guard, deadline - now) {
                    Ok(pair) => pair,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if result.timed_out() {
                    None
                } else {
                    Some(g)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn write_then_read_preserves_order() {
        let q = ByteQueue::with_capacity(16);
        assert_eq!(q.write(b"abc", None), 3);
        let mut buf = [0u8; 8];
        let n = q.read(&mut buf, Some(Duration::from_secs(1)));
        assert_eq!(&buf[..n], b"abc");
    }

    #[test]
    fn write_times_out_when_full() {
        let q = ByteQueue::with_capacity(4);
        let n = q.write(b"123456", Some(Duration::from_millis(20)));
        assert_eq!(n, 4, "partial progress up to capacity");
        assert_eq!(q.free(), 0);
    }

    #[test]
    fn read_times_out_when_empty() {
        let q = ByteQueue::with_capacity(4);
        let mut buf = [0u8; 4];
        let n = q.read(&mut buf, Some(Duration::from_millis(20)));
        assert_eq!(n, 0);
    }

    #[test]
    fn blocked_writer_resumes_when_reader_drains() {
        let q = Arc::new(ByteQueue::with_capacity(4));
        let writer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || q.write(b"12345678", None))
        };

        let mut collected = Vec::new();
        let mut buf = [0u8; 4];
        while collected.len() < 8 {
            let n = q.read(&mut buf, Some(Duration::from_secs(2)));
            assert!(n > 0, "reader starved");
            collected.extend_from_slice(&buf[..n]);
        }
        assert_eq!(writer.join().unwrap(), 8);
        assert_eq!(collected, b"12345678");
    }

    #[test]
    fn read_at_least_waits_for_threshold() {
        let q = Arc::new(ByteQueue::with_capacity(64));
        let producer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                q.write(b"ab", None);
                std::thread::sleep(Duration::from_millis(30));
                q.write(b"cdef", None);
            })
        };

        let mut buf = [0u8; 32];
        let n = q.read_at_least(&mut buf, 5, Some(Duration::from_secs(2)));
        assert!(n >= 5, "got {n} bytes");
        assert_eq!(&buf[..2], b"ab");
        producer.join().unwrap();
    }

    #[test]
    fn read_at_least_returns_leftovers_on_timeout() {
        let q = ByteQueue::with_capacity(16);
        q.write(b"xy", None);
        let mut buf = [0u8; 8];
        let n = q.read_at_least(&mut buf, 5, Some(Duration::from_millis(20)));
        assert_eq!(&buf[..n], b"xy");
    }

    #[test]
    fn drain_into_never_blocks() {
        let q = ByteQueue::with_capacity(16);
        let mut buf = [0u8; 8];
        assert_eq!(q.drain_into(&mut buf), 0);
        q.write(b"data", None);
        assert_eq!(q.drain_into(&mut buf), 4);
    }

    #[test]
    fn clear_discards_content_and_unblocks_writer() {
        let q = Arc::new(ByteQueue::with_capacity(4));
        q.write(b"full", None);

        let writer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || q.write(b"more", None))
        };
        std::thread::sleep(Duration::from_millis(20));
        q.clear();
        assert_eq!(writer.join().unwrap(), 4);
    }

    #[test]
    fn wait_empty_observes_the_drain() {
        let q = Arc::new(ByteQueue::with_capacity(16));
        q.write(b"pending", None);

        let reader = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                let mut buf = [0u8; 16];
                q.read(&mut buf, Some(Duration::from_secs(1)))
            })
        };
        assert!(q.wait_empty(Some(Duration::from_secs(2))));
        assert_eq!(reader.join().unwrap(), 7);
        assert!(!q.wait_empty(Some(Duration::from_millis(1))) || q.is_empty());
    }
}
