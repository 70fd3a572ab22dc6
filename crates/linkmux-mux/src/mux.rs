//! The sink multiplexer pump.
//!
//! Event-driven: sleeps on the ready signal, wakes when any channel has data
//! or the flow window changed, and transmits at most one frame per wake.

use std::sync::Arc;

use bytes::BytesMut;
use linkmux_frame::{self as frame, FRAME_MAX_SIZE, HEARTBEAT_CHANNEL, PACKET_DATA_MAX_SIZE};
use linkmux_transport::LinkPort;
use tracing::{debug, error, trace, warn};

use crate::registry::{Direction, Registry};
use crate::signal::{channel_bit, lowest_channel, ReadySignal, WINDOW_BIT};
use crate::window::current_window;

pub(crate) struct SinkPump {
    pub(crate) port: LinkPort,
    pub(crate) registry: Arc<Registry>,
    pub(crate) signal: Arc<ReadySignal>,
    /// Window value the peer last heard from us. A standalone heartbeat is
    /// only worth sending when the value changed; without this check two
    /// idle multiplexers would answer each other's heartbeats forever.
    pub(crate) advertised: Option<u8>,
}

impl SinkPump {
    /// Permanent loop; never returns while the link is writable.
    pub(crate) fn run(mut self) {
        let mut payload = [0u8; PACKET_DATA_MAX_SIZE];
        let mut wire = BytesMut::with_capacity(FRAME_MAX_SIZE);

        loop {
            let bits = self.signal.wait_any();
            // Fresh on every wake; the advertised window must track the
            // live receive-buffer occupancy.
            let window = current_window(&self.port);

            if let Some(id) = lowest_channel(bits) {
                self.signal.clear(channel_bit(id));
                if !self.service_channel(id, window, &mut payload, &mut wire) {
                    return;
                }
            } else if bits & WINDOW_BIT != 0 {
                self.signal.clear(WINDOW_BIT);
                if self.advertised == Some(window) {
                    continue;
                }
                if !self.send_heartbeat(window, &mut wire) {
                    return;
                }
            }
        }
    }

    /// Drain one packet's worth from the channel and put it on the wire.
    /// Returns false only when the link itself is dead.
    fn service_channel(
        &mut self,
        id: u8,
        window: u8,
        payload: &mut [u8; PACKET_DATA_MAX_SIZE],
        wire: &mut BytesMut,
    ) -> bool {
        let Some(queue) = self.registry.get_raw(Direction::Sink, id) else {
            // Race with external misuse: a signal for an id nobody bound.
            warn!(channel = id, "ready signal for unregistered sink channel");
            return true;
        };
        let queue = Arc::clone(queue);

        let drained = queue.drain_into(payload);
        if drained == 0 {
            // Already emptied by an earlier wake for the same signal.
            return true;
        }

        if let Err(err) = frame::encode(window, id, &payload[..drained], wire) {
            error!(channel = id, error = %err, "failed to encode frame");
            return true;
        }
        trace!(channel = id, bytes = drained, window, "transmitting frame");
        if !self.transmit(wire) {
            return false;
        }
        // The fresh window just went out piggybacked on this packet.
        self.advertised = Some(window);
        self.signal.clear(WINDOW_BIT);

        // The producer signalled once; anything beyond one packet's worth
        // must not strand in the buffer.
        if !queue.is_empty() {
            self.signal.raise(channel_bit(id));
        }
        true
    }

    /// Carry a window update to the peer when no data is pending to
    /// piggyback it on.
    fn send_heartbeat(&mut self, window: u8, wire: &mut BytesMut) -> bool {
        if let Err(err) = frame::encode(window, HEARTBEAT_CHANNEL, &[], wire) {
            error!(error = %err, "failed to encode heartbeat");
            return true;
        }
        trace!(window, "transmitting flow-control heartbeat");
        if !self.transmit(wire) {
            return false;
        }
        self.advertised = Some(window);
        true
    }

    fn transmit(&mut self, wire: &BytesMut) -> bool {
        match self.port.write_link(wire) {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "link write failed; sink pump exiting");
                false
            }
        }
    }
}
