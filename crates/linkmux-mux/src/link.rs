use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use linkmux_transport::LinkPort;
use tracing::{debug, error};

use crate::channel::{ChannelId, SinkHandle, SourceHandle};
use crate::demux::SourcePump;
use crate::error::{MuxError, Result};
use crate::mux::SinkPump;
use crate::queue::ByteQueue;
use crate::registry::{Direction, Registry};
use crate::signal::ReadySignal;

/// Tunables for the pump tasks.
#[derive(Debug, Clone, Copy)]
pub struct MuxConfig {
    /// How long one demux poll of the physical link may wait for bytes.
    pub poll_interval: Duration,
    /// Bound on blocking delivery into a full source channel; `None`
    /// blocks forever (the original head-of-line tradeoff).
    pub delivery_timeout: Option<Duration>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            delivery_timeout: None,
        }
    }
}

/// Startup-phase handle: creates channels, then [`start`](Self::start)s the
/// pumps. All channel creation is single-threaded and happens before any
/// pump or signal can run, which is what lets the registry stay lock-free.
pub struct LinkMuxBuilder {
    port: LinkPort,
    config: MuxConfig,
    registry: Registry,
    signal: Arc<ReadySignal>,
}

impl LinkMuxBuilder {
    fn new(port: LinkPort) -> Self {
        Self {
            port,
            config: MuxConfig::default(),
            registry: Registry::new(),
            signal: Arc::new(ReadySignal::new()),
        }
    }

    pub fn with_config(mut self, config: MuxConfig) -> Self {
        self.config = config;
        self
    }

    /// Create an outbound channel with a buffer of `capacity` bytes.
    ///
    /// Creating the same id twice logs an error and returns a handle to the
    /// existing channel — the original is kept, no duplicate entry exists.
    pub fn sink_channel(&mut self, id: ChannelId, capacity: usize) -> Result<SinkHandle> {
        let queue = self.bind(Direction::Sink, id, capacity)?;
        Ok(SinkHandle::new(id, queue, Arc::clone(&self.signal)))
    }

    /// Create an inbound channel with a buffer of `capacity` bytes. Same
    /// duplicate-creation behaviour as [`sink_channel`](Self::sink_channel).
    pub fn source_channel(&mut self, id: ChannelId, capacity: usize) -> Result<SourceHandle> {
        let queue = self.bind(Direction::Source, id, capacity)?;
        Ok(SourceHandle::new(id, queue))
    }

    fn bind(
        &mut self,
        direction: Direction,
        id: ChannelId,
        capacity: usize,
    ) -> Result<Arc<ByteQueue>> {
        if id.raw() == linkmux_frame::HEARTBEAT_CHANNEL {
            return Err(MuxError::ReservedChannel);
        }
        let queue = Arc::new(ByteQueue::with_capacity(capacity));
        match self.registry.bind(direction, id, queue) {
            Ok(queue) => Ok(queue),
            Err(existing) => {
                error!(
                    channel = id.raw(),
                    ?direction,
                    "channel already exists; reusing the original"
                );
                Ok(existing)
            }
        }
    }

    /// Freeze the registry and spawn the two permanent pump threads.
    pub fn start(self) -> Result<LinkMux> {
        let tx_port = self.port.try_clone()?;
        let registry = Arc::new(self.registry);
        let peer_window = Arc::new(AtomicU8::new(0));

        let sink = SinkPump {
            port: tx_port,
            registry: Arc::clone(&registry),
            signal: Arc::clone(&self.signal),
            advertised: None,
        };
        let source = SourcePump {
            port: self.port,
            registry: Arc::clone(&registry),
            signal: Arc::clone(&self.signal),
            peer_window: Arc::clone(&peer_window),
            config: self.config,
        };

        let sink_thread = std::thread::Builder::new()
            .name("linkmux-sink".into())
            .spawn(move || sink.run())?;
        let demux_thread = std::thread::Builder::new()
            .name("linkmux-demux".into())
            .spawn(move || source.run())?;

        debug!("link multiplexer started");
        Ok(LinkMux {
            signal: self.signal,
            peer_window,
            sink_thread,
            demux_thread,
        })
    }
}

/// The owned multiplexer context: registry, signal and the two pump task
/// handles, constructed once at startup. Pump tasks hold references into it
/// rather than touching ambient statics; there is no cancellation — the
/// pumps run for the life of the device.
pub struct LinkMux {
    signal: Arc<ReadySignal>,
    peer_window: Arc<AtomicU8>,
    sink_thread: JoinHandle<()>,
    demux_thread: JoinHandle<()>,
}

impl LinkMux {
    /// Begin startup over one physical link.
    pub fn builder(port: LinkPort) -> LinkMuxBuilder {
        LinkMuxBuilder::new(port)
    }

    /// The flow window the peer most recently advertised. Purely advisory.
    pub fn peer_window(&self) -> u8 {
        self.peer_window.load(Ordering::Relaxed)
    }

    /// Whether both pump tasks are still alive. They only exit when the
    /// link itself dies.
    pub fn is_running(&self) -> bool {
        !self.sink_thread.is_finished() && !self.demux_thread.is_finished()
    }

    /// The shared ready signal, for embedders that need to raise bits from
    /// a context without a handle.
    pub fn signal(&self) -> &Arc<ReadySignal> {
        &self.signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkmux_transport::loopback;

    fn id(raw: u8) -> ChannelId {
        ChannelId::new(raw).unwrap()
    }

    #[test]
    fn duplicate_sink_channel_reuses_the_original() {
        let (port, _peer) = loopback(256);
        let mut builder = LinkMux::builder(port);

        let first = builder.sink_channel(id(2), 64).unwrap();
        let second = builder.sink_channel(id(2), 64).unwrap();

        assert!(Arc::ptr_eq(first.queue(), second.queue()));
    }

    #[test]
    fn channel_zero_is_refused() {
        let (port, _peer) = loopback(256);
        let mut builder = LinkMux::builder(port);

        assert!(matches!(
            builder.sink_channel(id(0), 64),
            Err(MuxError::ReservedChannel)
        ));
        assert!(matches!(
            builder.source_channel(id(0), 64),
            Err(MuxError::ReservedChannel)
        ));
    }

    #[test]
    fn start_spawns_live_pumps() {
        let (port, _peer) = loopback(256);
        let mut builder = LinkMux::builder(port);
        let _sink = builder.sink_channel(id(1), 64).unwrap();
        let mux = builder.start().unwrap();

        assert!(mux.is_running());
        assert_eq!(mux.peer_window(), 0);
    }
}
