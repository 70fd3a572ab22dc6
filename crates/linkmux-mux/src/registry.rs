use std::sync::Arc;

use crate::channel::ChannelId;
use crate::queue::ByteQueue;

/// Outbound or inbound side of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sink,
    Source,
}

/// Channel tables, one per direction.
///
/// Populated single-threaded during startup, immutable once the pump tasks
/// run — which is why lookups need no lock. At most one channel exists per
/// id and direction.
#[derive(Debug)]
pub struct Registry {
    sinks: Vec<Option<Arc<ByteQueue>>>,
    sources: Vec<Option<Arc<ByteQueue>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        let slots = ChannelId::MAX as usize + 1;
        Self {
            sinks: vec![None; slots],
            sources: vec![None; slots],
        }
    }

    pub(crate) fn get(&self, direction: Direction, id: ChannelId) -> Option<&Arc<ByteQueue>> {
        self.table(direction)[id.raw() as usize].as_ref()
    }

    /// Lookup by raw wire id, used by the demux pump on received packets.
    pub(crate) fn get_raw(&self, direction: Direction, raw: u8) -> Option<&Arc<ByteQueue>> {
        self.table(direction).get(raw as usize)?.as_ref()
    }

    /// Register a queue; returns the already-registered queue instead when
    /// the slot is taken (the caller logs the duplicate).
    pub(crate) fn bind(
        &mut self,
        direction: Direction,
        id: ChannelId,
        queue: Arc<ByteQueue>,
    ) -> std::result::Result<Arc<ByteQueue>, Arc<ByteQueue>> {
        let slot = &mut self.table_mut(direction)[id.raw() as usize];
        match slot {
            Some(existing) => Err(Arc::clone(existing)),
            None => {
                *slot = Some(Arc::clone(&queue));
                Ok(queue)
            }
        }
    }

    fn table(&self, direction: Direction) -> &Vec<Option<Arc<ByteQueue>>> {
        match direction {
            Direction::Sink => &self.sinks,
            Direction::Source => &self.sources,
        }
    }

    fn table_mut(&mut self, direction: Direction) -> &mut Vec<Option<Arc<ByteQueue>>> {
        match direction {
            Direction::Sink => &mut self.sinks,
            Direction::Source => &mut self.sources,
        }
    }
}
