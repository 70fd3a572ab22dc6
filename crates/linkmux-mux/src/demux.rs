//! The source demultiplexer pump.
//!
//! A best-effort poller: short bounded-timeout reads of the physical link
//! keep the hardware receive buffer drained before it overflows, and every
//! consumed chunk frees capacity, so the pump republishes the flow window
//! after each one.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use linkmux_frame::{Deframer, Packet};
use linkmux_transport::LinkPort;
use tracing::{debug, info, trace, warn};

use crate::link::MuxConfig;
use crate::registry::{Direction, Registry};
use crate::signal::{ReadySignal, WINDOW_BIT};

/// Read chunk sized comfortably above one maximum frame.
const CHUNK_SIZE: usize = 300;

pub(crate) struct SourcePump {
    pub(crate) port: LinkPort,
    pub(crate) registry: Arc<Registry>,
    pub(crate) signal: Arc<ReadySignal>,
    pub(crate) peer_window: Arc<AtomicU8>,
    pub(crate) config: MuxConfig,
}

impl SourcePump {
    /// Permanent loop; returns when the peer end of the link is gone.
    pub(crate) fn run(mut self) {
        let mut deframer = Deframer::new();
        let mut chunk = [0u8; CHUNK_SIZE];

        loop {
            let read = match self.port.read_link(&mut chunk, self.config.poll_interval) {
                Ok(0) => continue,
                Ok(n) => n,
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    info!("link closed by peer; source pump exiting");
                    return;
                }
                Err(err) => {
                    debug!(error = %err, "link read failed; source pump exiting");
                    return;
                }
            };

            let registry = Arc::clone(&self.registry);
            let peer_window = Arc::clone(&self.peer_window);
            let config = self.config;
            deframer.push(&chunk[..read], |packet| {
                deliver(&registry, &peer_window, &config, packet);
            });

            // Receive-buffer capacity was just freed; let the peer know.
            self.signal.raise(WINDOW_BIT);
        }
    }
}

fn deliver(
    registry: &Registry,
    peer_window: &AtomicU8,
    config: &MuxConfig,
    packet: Packet,
) {
    // Every packet piggybacks the sender's current window.
    peer_window.store(packet.window, Ordering::Relaxed);

    if packet.is_heartbeat() {
        trace!(window = packet.window, "flow-control heartbeat");
        return;
    }

    let Some(queue) = registry.get_raw(Direction::Source, packet.channel) else {
        warn!(
            channel = packet.channel,
            bytes = packet.payload.len(),
            "dropping frame for unregistered source channel"
        );
        return;
    };

    // Backpressure point: a consumer that stops reading eventually stalls
    // the whole pump here, for up to the configured delivery timeout.
    if queue.free() < packet.payload.len() {
        warn!(
            channel = packet.channel,
            free = queue.free(),
            needed = packet.payload.len(),
            "source channel nearly full, delivery may block"
        );
    }
    let written = queue.write(&packet.payload, config.delivery_timeout);
    if written < packet.payload.len() {
        warn!(
            channel = packet.channel,
            dropped = packet.payload.len() - written,
            "source channel full, dropping payload bytes"
        );
    }
}
