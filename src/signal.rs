//! Rendezvous signals between interrupt context and deferred context.
//!
//! `tx_ready` (per interface) and `net_event` (process-wide) are dirty
//! flags, not counting semaphores: spec §4.3 requires that a single TX
//! completion never causes more than one `tx_ready` assertion to reach the
//! stack, and `Signal::set` is naturally idempotent under repeated sets
//! between two `take`s.

use core::sync::atomic::{AtomicBool, Ordering};

/// A single-bit dirty flag, safe to `set` from interrupt context and `take`
/// from deferred context with no additional locking.
#[derive(Debug, Default)]
pub struct Signal(AtomicBool);

impl Signal {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Raise the flag. Called from ISR or deferred context.
    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Observe without clearing.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear and return the previous value.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_idempotent_until_taken() {
        let s = Signal::new();
        assert!(!s.is_set());
        s.set();
        s.set();
        s.set();
        assert!(s.take());
        // Exactly one observable assertion reached the consumer.
        assert!(!s.take());
    }
}
