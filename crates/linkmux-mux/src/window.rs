use linkmux_frame::WINDOW_MAX;
use linkmux_transport::LinkPort;

/// Quantise the link's free receive capacity into the 4-bit flow window.
///
/// Recomputed from the live occupancy on every sink-pump wake, never cached.
/// The value is purely advisory: it lets the peer throttle, it acknowledges
/// nothing, and a lost update self-heals with the next packet or heartbeat.
pub fn current_window(port: &LinkPort) -> u8 {
    quantise(port.rx_free(), port.rx_capacity())
}

fn quantise(free: usize, capacity: usize) -> u8 {
    if capacity == 0 {
        return 0;
    }
    (free.min(capacity) * WINDOW_MAX as usize / capacity) as u8
}
