use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use linkmux_frame::CHANNEL_MAX;

use crate::error::{MuxError, Result};
use crate::queue::ByteQueue;
use crate::signal::{channel_bit, ReadySignal};

/// A validated channel identifier (0..=22).
///
/// Ids are chosen statically by the application, never allocated; they need
/// not be contiguous. Id 0 belongs to flow-control heartbeats and cannot be
/// bound to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Highest valid id.
    pub const MAX: u8 = CHANNEL_MAX;

    pub fn new(raw: u8) -> Result<Self> {
        if raw > Self::MAX {
            return Err(MuxError::InvalidChannel(raw));
        }
        Ok(Self(raw))
    }

    pub fn raw(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = MuxError;

    fn try_from(raw: u8) -> Result<Self> {
        Self::new(raw)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque descriptor for an outbound channel.
///
/// Writing enqueues into the channel's buffer and signals the sink pump.
/// One producer per handle; the handle is deliberately not `Clone`.
pub struct SinkHandle {
    id: ChannelId,
    queue: Arc<ByteQueue>,
    signal: Arc<ReadySignal>,
}

impl SinkHandle {
    pub(crate) fn new(id: ChannelId, queue: Arc<ByteQueue>, signal: Arc<ReadySignal>) -> Self {
        Self { id, queue, signal }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Enqueue `data` and signal the sink pump. Blocks while the channel
    /// buffer is full, up to `timeout` (`None` blocks forever).
    ///
    /// On timeout the bytes already queued stay queued and are still
    /// transmitted; the error reports both counts.
    pub fn write(&self, data: &[u8], timeout: Option<Duration>) -> Result<()> {
        let written = self.queue.write(data, timeout);
        if written > 0 {
            self.notify();
        }
        if written < data.len() {
            return Err(MuxError::WriteTimeout {
                requested: data.len(),
                written,
            });
        }
        Ok(())
    }

    /// Explicitly signal the sink pump — for data placed in the channel
    /// buffer through a path that does not auto-signal. Non-blocking and
    /// safe to call from any context.
    pub fn notify(&self) {
        self.signal.raise(channel_bit(self.id.raw()));
    }

    /// Wait until the pump has drained everything queued so far.
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        self.queue.wait_empty(timeout)
    }

    pub(crate) fn queue(&self) -> &Arc<ByteQueue> {
        &self.queue
    }
}

/// Opaque descriptor for an inbound channel. One consumer per handle.
pub struct SourceHandle {
    id: ChannelId,
    queue: Arc<ByteQueue>,
}

impl SourceHandle {
    pub(crate) fn new(id: ChannelId, queue: Arc<ByteQueue>) -> Self {
        Self { id, queue }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Read up to `buf.len()` bytes, waiting for at least one.
    pub fn read(&self, buf: &mut [u8], timeout: Option<Duration>) -> usize {
        self.queue.read(buf, timeout)
    }

    /// Read until at least `at_least` bytes are available (bounded by
    /// `timeout`), then return any additional already-buffered bytes
    /// without extra waiting.
    pub fn read_at_least(
        &self,
        buf: &mut [u8],
        at_least: usize,
        timeout: Option<Duration>,
    ) -> usize {
        self.queue.read_at_least(buf, at_least, timeout)
    }

    /// Discard everything buffered on this channel — used to drop stale
    /// input before starting a fresh higher-level exchange.
    pub fn discard(&self) {
        self.queue.clear();
    }

    pub(crate) fn queue(&self) -> &Arc<ByteQueue> {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_range() {
        assert!(ChannelId::new(0).is_ok());
        assert!(ChannelId::new(22).is_ok());
        assert!(matches!(
            ChannelId::new(23),
            Err(MuxError::InvalidChannel(23))
        ));
    }

    #[test]
    fn sink_write_signals_the_pump() {
        let queue = Arc::new(ByteQueue::with_capacity(16));
        let signal = Arc::new(ReadySignal::new());
        let sink = SinkHandle::new(ChannelId::new(3).unwrap(), queue, Arc::clone(&signal));

        sink.write(b"data", None).unwrap();
        assert_eq!(signal.snapshot(), channel_bit(3));
    }

    #[test]
    fn sink_write_timeout_reports_partial_progress() {
        let queue = Arc::new(ByteQueue::with_capacity(4));
        let signal = Arc::new(ReadySignal::new());
        let sink = SinkHandle::new(ChannelId::new(1).unwrap(), queue, signal);

        let err = sink
            .write(b"123456", Some(Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(
            err,
            MuxError::WriteTimeout {
                requested: 6,
                written: 4
            }
        ));
    }

    #[test]
    fn source_discard_empties_the_buffer() {
        let queue = Arc::new(ByteQueue::with_capacity(16));
        queue.write(b"stale", None);
        let source = SourceHandle::new(ChannelId::new(2).unwrap(), Arc::clone(&queue));

        source.discard();
        assert!(queue.is_empty());
    }
}
