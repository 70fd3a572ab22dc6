use std::sync::{Condvar, Mutex, MutexGuard};

/// Bit for channel id `n` is `1 << n`; ids run 0..=22.
pub const CHANNEL_MASK: u32 = (1 << 23) - 1;
/// Raised when the local flow window may have changed.
pub const WINDOW_BIT: u32 = 1 << 23;
/// Every bit the sink pump waits on.
pub const EVENT_MASK: u32 = CHANNEL_MASK | WINDOW_BIT;

/// The multi-bit ready signal the sink pump blocks on.
///
/// This is the only structure mutated concurrently after startup: producers
/// (from any task context) raise bits, the sink pump snapshots and clears
/// them. All access goes through these set/clear/wait primitives — the mask
/// is never read-modify-written elsewhere. [`raise`](Self::raise) is brief
/// and non-allocating; it is the entry point safe to call from signal-like
/// contexts. On an RTOS target this maps onto an event group.
#[derive(Debug, Default)]
pub struct ReadySignal {
    bits: Mutex<u32>,
    ready: Condvar,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set every bit in `mask` and wake the sink pump.
    pub fn raise(&self, mask: u32) {
        let mut bits = self.lock();
        *bits |= mask & EVENT_MASK;
        self.ready.notify_all();
    }

    /// Clear every bit in `mask`.
    pub fn clear(&self, mask: u32) {
        let mut bits = self.lock();
        *bits &= !mask;
    }

    /// Current bits without waiting.
    pub fn snapshot(&self) -> u32 {
        *self.lock()
    }

    /// Block until at least one bit is set; returns a snapshot without
    /// clearing anything. The sink pump has no other work, so the wait is
    /// unbounded.
    pub fn wait_any(&self) -> u32 {
        let mut bits = self.lock();
        loop {
            if *bits != 0 {
                return *bits;
            }
            bits = match self.ready.wait(bits) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    fn lock(&self) -> MutexGuard<'_, u32> {
        match self.bits.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The ready bit for a channel id.
pub fn channel_bit(id: u8) -> u32 {
    1 << id
}

/// Numerically smallest channel id with a set bit — the tie-break rule for
/// which channel gets serviced first.
pub fn lowest_channel(bits: u32) -> Option<u8> {
    let masked = bits & CHANNEL_MASK;
    if masked == 0 {
        None
    } else {
        Some(masked.trailing_zeros() as u8)
    }
}
