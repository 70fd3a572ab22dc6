//! The link multiplexing subsystem.
//!
//! Several logically independent byte streams share one physical full-duplex
//! link. Producers write into sink channels from any context; the sink
//! multiplexer pump drains one ready channel per wake, frames the bytes and
//! transmits them. Received bytes are reassembled into frames, validated and
//! demultiplexed into source channels. A 4-bit flow window derived from the
//! local receive-buffer occupancy rides along in every packet's service byte.
//!
//! Construction happens once, single-threaded, through [`LinkMuxBuilder`];
//! after [`LinkMuxBuilder::start`] the channel registry is immutable and the
//! two pump threads run for the life of the process. Per channel, byte order
//! is preserved end to end; across channels there is no ordering guarantee,
//! and the lowest-numbered ready channel is always serviced first.

pub mod channel;
pub mod demux;
pub mod error;
pub mod link;
pub mod mux;
pub mod queue;
pub mod registry;
pub mod signal;
pub mod window;

pub use channel::{ChannelId, SinkHandle, SourceHandle};
pub use error::{MuxError, Result};
pub use link::{LinkMux, LinkMuxBuilder, MuxConfig};
pub use queue::ByteQueue;
pub use signal::ReadySignal;
