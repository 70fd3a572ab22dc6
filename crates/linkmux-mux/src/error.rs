use linkmux_transport::TransportError;

/// Errors reported at the multiplexer's programmatic boundary.
///
/// Failures inside the pump tasks (malformed frames, unknown channels, full
/// destinations) are handled locally and logged, never surfaced here.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// The channel id is outside 0..=22.
    #[error("channel id {0} outside 0..=22")]
    InvalidChannel(u8),

    /// Channel 0 belongs to flow-control heartbeats and cannot be bound.
    #[error("channel 0 is reserved for flow-control heartbeats")]
    ReservedChannel,

    /// A sink write hit its timeout before every byte was queued. The bytes
    /// that were queued remain in the channel and will still be transmitted.
    #[error("sink write timed out ({written} of {requested} bytes queued)")]
    WriteTimeout { requested: usize, written: usize },

    /// The underlying link transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MuxError>;
