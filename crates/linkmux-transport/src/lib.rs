//! Physical-link abstraction for linkmux.
//!
//! A [`LinkPort`] models the one full-duplex byte stream the device exposes to
//! the outside world: bounded-timeout reads, write-all semantics, and a
//! receive buffer whose occupancy can be observed (the input to the
//! flow-control window). Two backends are provided:
//!
//! - an in-memory [`loopback`] pair with exact occupancy accounting, used by
//!   tests and by embedders that stub out the physical link, and
//! - a Unix domain socket stand-in for a real serial device ([`UnixLink`]),
//!   where occupancy comes from `FIONREAD` and capacity from `SO_RCVBUF`.
//!
//! This is the lowest layer of linkmux. Everything else builds on top of the
//! [`LinkPort`] type provided here.

pub mod error;
pub mod mem;
pub mod port;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use mem::loopback;
pub use port::LinkPort;

#[cfg(unix)]
pub use uds::UnixLink;
