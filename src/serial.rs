//! C5 — the serial-attached (SPI) controller adapter (spec §4.5): the
//! primitives shared by every SPI-attached MAC, independent of any one
//! chip's command set — a banked register file, a double-read-until-stable
//! 16-bit read (silicon that updates status registers asynchronously to the
//! SPI clock needs this), and the address-wrap arithmetic both the
//! ENC28J60 and W5100 families need for their on-chip FIFOs.

use core::cell::Cell;

use crate::error::{NicError, NicResult};

/// The raw transport underneath every SPI-attached controller: one
/// full-duplex transfer with chip-select held for its duration. Concrete
/// chips layer their command/opcode framing on top of this.
pub trait SpiTransport {
    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> NicResult<()>;
}

/// How many times `read_u16_stable` re-reads before giving up (spec §9
/// REDESIGN FLAGS: bounded retry, never an unbounded spin).
pub const STABLE_READ_ATTEMPTS: u8 = 8;

/// Read a 16-bit register twice (or more) until two consecutive reads
/// agree, for status/pointer registers a controller updates outside the
/// SPI clock domain. Surfaces `wrong_state` rather than looping forever if
/// the value never settles within `STABLE_READ_ATTEMPTS` (spec §9).
pub fn read_u16_stable<F: FnMut() -> NicResult<u16>>(mut read: F) -> NicResult<u16> {
    let mut previous = read()?;
    for _ in 0..STABLE_READ_ATTEMPTS {
        let current = read()?;
        if current == previous {
            return Ok(current);
        }
        previous = current;
    }
    Err(NicError::WrongState)
}

/// A register file split into banks (spec §4.5: "most SPI-attached MACs
/// bank their control registers"), with the current bank cached so a
/// sequence of same-bank accesses doesn't re-select it every time.
pub struct BankedRegisterFile<T> {
    transport: T,
    current_bank: Cell<Option<u8>>,
}

impl<T: SpiTransport> BankedRegisterFile<T> {
    pub fn new(transport: T) -> Self {
        BankedRegisterFile {
            transport,
            current_bank: Cell::new(None),
        }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Select `bank` only if it differs from the cached current bank.
    /// `select` performs the chip-specific bank-select command.
    pub fn ensure_bank<F>(&mut self, bank: u8, mut select: F) -> NicResult<()>
    where
        F: FnMut(&mut T, u8) -> NicResult<()>,
    {
        if self.current_bank.get() == Some(bank) {
            return Ok(());
        }
        select(&mut self.transport, bank)?;
        self.current_bank.set(Some(bank));
        Ok(())
    }

    /// Invalidate the cached bank, forcing the next `ensure_bank` call to
    /// reselect even if it names the same bank as before (used after a
    /// soft reset, which leaves the bank select register in an unknown
    /// state from this file's point of view).
    pub fn invalidate_bank_cache(&self) {
        self.current_bank.set(None);
    }
}

/// ENC28J60 silicon errata: the receive buffer read pointer must always be
/// odd, or the last byte of a packet is dropped. When advancing past a
/// received packet, round an even `next_packet` pointer down by one,
/// except at the ring's start boundary, which wraps to the end instead
/// (spec §9: "workarounds are part of the adapter, not bugs to silently
/// fix away").
pub fn enc28j60_next_packet_ptr(next_packet: u16, rx_start: u16, rx_end: u16) -> u16 {
    if next_packet == rx_start {
        rx_end
    } else if next_packet % 2 == 0 {
        next_packet - 1
    } else {
        next_packet
    }
}

/// A power-of-two circular buffer's address arithmetic (spec §4.5:
/// "W5100-style controllers expose their TX/RX FIFOs as a flat, wrapping
/// address space"). `size` must be a power of two; construction is
/// infallible and relies on the caller only ever using sizes a real chip
/// actually has (2/4/8 KiB).
#[derive(Copy, Clone, Debug)]
pub struct RingOffsets {
    size: u16,
}

impl RingOffsets {
    pub fn new(size: u16) -> Self {
        debug_assert!(size.is_power_of_two());
        RingOffsets { size }
    }

    pub fn mask(&self, ptr: u16) -> u16 {
        ptr & (self.size - 1)
    }

    /// Split a `len`-byte run starting at `ptr` into the bytes before the
    /// buffer wraps and the bytes after. The second segment is zero unless
    /// the run actually crosses the end of the ring.
    pub fn split(&self, ptr: u16, len: u16) -> (u16, u16) {
        let offset = self.mask(ptr);
        let first = len.min(self.size - offset);
        (first, len - first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_read_returns_once_two_consecutive_reads_agree() {
        let mut calls = [0x10u16, 0x20, 0x20, 0x99];
        let mut i = 0;
        let result = read_u16_stable(|| {
            let v = calls[i];
            i += 1;
            Ok(v)
        });
        assert_eq!(result.unwrap(), 0x20);
    }

    #[test]
    fn stable_read_gives_up_after_bound_is_exhausted() {
        let mut toggle = false;
        let result = read_u16_stable(|| {
            toggle = !toggle;
            Ok(if toggle { 1 } else { 2 })
        });
        assert_eq!(result, Err(NicError::WrongState));
    }

    #[test]
    fn bank_select_is_skipped_when_already_current() {
        struct NullSpi;
        impl SpiTransport for NullSpi {
            fn transfer(&mut self, _write: &[u8], _read: &mut [u8]) -> NicResult<()> {
                Ok(())
            }
        }
        let mut file = BankedRegisterFile::new(NullSpi);
        let mut selects = 0;
        file.ensure_bank(2, |_t, _b| {
            selects += 1;
            Ok(())
        })
        .unwrap();
        file.ensure_bank(2, |_t, _b| {
            selects += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(selects, 1);

        file.invalidate_bank_cache();
        file.ensure_bank(2, |_t, _b| {
            selects += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(selects, 2);
    }

    #[test]
    fn enc28j60_even_pointer_rounds_down_to_odd() {
        assert_eq!(enc28j60_next_packet_ptr(0x0602, 0x0600, 0x1FFF), 0x0601);
        assert_eq!(enc28j60_next_packet_ptr(0x0603, 0x0600, 0x1FFF), 0x0603);
        assert_eq!(enc28j60_next_packet_ptr(0x0600, 0x0600, 0x1FFF), 0x1FFF);
    }

    #[test]
    fn ring_offsets_split_detects_wraparound() {
        let ring = RingOffsets::new(2048);
        assert_eq!(ring.split(2000, 100), (48, 52));
        assert_eq!(ring.split(0, 100), (100, 0));
    }
}
