//! Channel multiplexing over a single full-duplex byte link.
//!
//! linkmux carries up to 22 independent byte streams over one physical link
//! (a Unix socket, or any stream of bytes) using COBS-delimited,
//! CRC-protected frames with credit-based flow control.
//!
//! # Crate Structure
//!
//! - [`transport`] — The physical link: Unix sockets and in-memory loopback
//! - [`frame`] — Wire format: COBS framing, CRC-16, packet codec
//! - [`mux`] — Channel registry, flow control and the two pump tasks
//!   (behind the default `mux` feature)

/// Re-export transport types.
pub mod transport {
    pub use linkmux_transport::*;
}

/// Re-export wire-format types.
pub mod frame {
    pub use linkmux_frame::*;
}

/// Re-export multiplexer types (requires `mux` feature).
#[cfg(feature = "mux")]
pub mod mux {
    pub use linkmux_mux::*;
}
