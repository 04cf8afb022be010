//! C3 — the DMA descriptor ring engine (spec §4.3): a producer view
//! (software fills a slot, then publishes it to the DMA engine) and a
//! consumer view (software reads a completed/filled slot, then returns it)
//! over a fixed-size array, with the ownership bit as the only handshake.
//!
//! `TxRing`/`RxRing` model the bookkeeping precisely as spec §4.3
//! describes. The actual MMIO glue that makes a real DMA engine observe a
//! ring (kicking the "resume" register, clearing underrun bits) is a
//! platform concern left to the concrete driver (`drivers::dma_mac`); this
//! module only owns the ownership-bit protocol, which is what spec §8's
//! ring invariants (1–4) and scenarios S1/S6 are actually about.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::error::{NicError, NicResult};

const SOFTWARE: u8 = 0;
const DMA: u8 = 1;

/// The ownership bit: the protocol field through which software and the
/// DMA engine hand a descriptor back and forth (spec GLOSSARY). Publishing
/// (software -> DMA) is a release; observing a DMA-side write (DMA ->
/// software) is an acquire, matching spec §5's ordering guarantees.
#[derive(Debug, Default)]
struct Ownership(AtomicU8);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Owner {
    Software,
    Dma,
}

impl Ownership {
    const fn new(owner: Owner) -> Self {
        Ownership(AtomicU8::new(match owner {
            Owner::Software => SOFTWARE,
            Owner::Dma => DMA,
        }))
    }

    fn get(&self) -> Owner {
        match self.0.load(Ordering::Acquire) {
            DMA => Owner::Dma,
            _ => Owner::Software,
        }
    }

    /// Publication barrier: all other descriptor fields must be written
    /// before this call (spec §4.3 step 4, §5 ordering guarantee).
    fn publish_to_dma(&self) {
        self.0.store(DMA, Ordering::Release);
    }

    fn release_to_software(&self) {
        self.0.store(SOFTWARE, Ordering::Release);
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct TxDescriptor {
    len: u16,
    error: bool,
}

/// A transmit descriptor ring with `N` fixed `SLOT_SIZE`-byte slots (spec
/// §4.3, "the canonical transmit ring has N slots").
pub struct TxRing<const N: usize, const SLOT_SIZE: usize> {
    ownership: [Ownership; N],
    desc: [TxDescriptor; N],
    buffers: [[u8; SLOT_SIZE]; N],
    cursor: usize,
}

impl<const N: usize, const SLOT_SIZE: usize> TxRing<N, SLOT_SIZE> {
    pub fn new() -> Self {
        TxRing {
            ownership: core::array::from_fn(|_| Ownership::new(Owner::Software)),
            desc: [TxDescriptor::default(); N],
            buffers: [[0u8; SLOT_SIZE]; N],
            cursor: 0,
        }
    }

    /// Send algorithm (spec §4.3 steps 1–7). Returns `Ok(true)` if the
    /// *next* slot after this send is also free — the caller must then
    /// re-assert `tx_ready` (spec §4.2's "if and only if" rule, §8
    /// property 3: a single completion never causes more than one
    /// assertion).
    pub fn send(&mut self, frame: &[u8]) -> NicResult<bool> {
        let idx = self.cursor;
        if self.ownership[idx].get() == Owner::Dma {
            return Err(NicError::TransientBusy);
        }
        if frame.len() > SLOT_SIZE {
            // Re-assert tx_ready so the stack drops the frame and
            // progresses instead of wedging on an oversized frame.
            return Err(NicError::LengthInvalid);
        }
        self.buffers[idx][..frame.len()].copy_from_slice(frame);
        self.desc[idx] = TxDescriptor {
            len: frame.len() as u16,
            error: false,
        };
        // Publication barrier: fields above are visible before the flip.
        self.ownership[idx].publish_to_dma();

        self.cursor = (self.cursor + 1) % N;
        Ok(self.ownership[self.cursor].get() == Owner::Software)
    }

    /// How many slots are currently held by the DMA engine (unsent/in
    /// flight). Spec §4.2 `queue_len`-style introspection.
    pub fn queued(&self) -> usize {
        self.ownership.iter().filter(|o| o.get() == Owner::Dma).count()
    }

    /// Models the DMA engine completing slot `idx` (hw_complete in spec
    /// §4.3's descriptor state diagram). A real driver calls this from its
    /// `event_handler` after reading the controller's completion status;
    /// it stands in for what, on real silicon, the DMA engine itself does
    /// to the descriptor memory.
    pub fn on_tx_complete(&mut self, idx: usize, error: bool) {
        debug_assert!(idx < N);
        self.desc[idx].error = error;
        self.ownership[idx].release_to_software();
    }

    pub fn is_slot_free(&self, idx: usize) -> bool {
        self.ownership[idx].get() == Owner::Software
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct RxDescriptor {
    len: u16,
    first_of_frame: bool,
    last_of_frame: bool,
    error: bool,
}

/// A receive descriptor ring, pre-armed so the DMA engine can fill slots
/// as frames arrive (spec §4.3 receive algorithm).
pub struct RxRing<const N: usize, const SLOT_SIZE: usize> {
    ownership: [Ownership; N],
    desc: [RxDescriptor; N],
    buffers: [[u8; SLOT_SIZE]; N],
    cursor: usize,
}

impl<const N: usize, const SLOT_SIZE: usize> RxRing<N, SLOT_SIZE> {
    /// All slots start armed (owned by DMA), matching spec §4.3's
    /// `HW_ARMED` initial descriptor state.
    pub fn new() -> Self {
        RxRing {
            ownership: core::array::from_fn(|_| Ownership::new(Owner::Dma)),
            desc: [RxDescriptor::default(); N],
            buffers: [[0u8; SLOT_SIZE]; N],
            cursor: 0,
        }
    }

    /// Models the DMA engine filling the slot at the current cursor
    /// (`hw_fill`). Stands in for what real silicon does to the
    /// descriptor/buffer memory directly; a driver's ISR would instead
    /// simply observe the ownership bit already flipped.
    pub fn fill(&mut self, idx: usize, data: &[u8], first: bool, last: bool, error: bool) {
        debug_assert!(idx < N);
        let n = data.len().min(SLOT_SIZE);
        self.buffers[idx][..n].copy_from_slice(&data[..n]);
        self.desc[idx] = RxDescriptor {
            len: n as u16,
            first_of_frame: first,
            last_of_frame: last,
            error,
        };
        self.ownership[idx].release_to_software();
    }

    /// Receive algorithm (spec §4.3 steps 1–5). Returns the payload length
    /// written into `out` on success.
    pub fn recv_into(&mut self, out: &mut [u8]) -> NicResult<usize> {
        let idx = self.cursor;
        if self.ownership[idx].get() == Owner::Dma {
            return Err(NicError::BufferEmpty);
        }
        // Acquisition barrier: the ownership read above happens-before
        // reading length/flags (spec §5).
        let d = self.desc[idx];
        let rearm = |ring: &mut Self| {
            ring.ownership[idx].publish_to_dma();
            ring.cursor = (ring.cursor + 1) % N;
        };

        if !(d.first_of_frame && d.last_of_frame) {
            rearm(self);
            return Err(NicError::InvalidPacket);
        }
        // Error takes precedence over completion when both are signaled
        // (spec §4.3 tie-break).
        if d.error {
            rearm(self);
            return Err(NicError::InvalidPacket);
        }
        if d.len == 0 {
            rearm(self);
            return Err(NicError::InvalidPacket);
        }
        let len = (d.len as usize).min(SLOT_SIZE).min(out.len());
        out[..len].copy_from_slice(&self.buffers[idx][..len]);
        rearm(self);
        Ok(len)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}
