//! A descriptor-ring DMA MAC (spec §4.3), grounded in the reference
//! driver's `Eth`/`RxRing` split: a fixed-size TX ring, a fixed-size RX
//! ring, and an interrupt handler that only ever drains what's already
//! arrived before returning (never busy-waits for more).

use log::{debug, trace};

use crate::buffer::Buffer;
use crate::driver::{Ancillary, NicCapabilities, NicDriver};
use crate::error::{NicError, NicResult};
use crate::iface::NetworkInterface;
use crate::ring::{RxRing, TxRing};

/// A DMA-ring MAC with `TX_N`/`RX_N` descriptors of `SLOT_SIZE` bytes each.
/// Matches the reference driver's fixed-capacity rings rather than a
/// heap-backed queue (spec §3: "bounded size, never allocates").
pub struct DmaMac<const TX_N: usize, const RX_N: usize, const SLOT_SIZE: usize> {
    tx: TxRing<TX_N, SLOT_SIZE>,
    rx: RxRing<RX_N, SLOT_SIZE>,
    irq_enabled: bool,
}

impl<const TX_N: usize, const RX_N: usize, const SLOT_SIZE: usize> DmaMac<TX_N, RX_N, SLOT_SIZE> {
    pub fn new() -> Self {
        DmaMac {
            tx: TxRing::new(),
            rx: RxRing::new(),
            irq_enabled: false,
        }
    }

    /// Test/simulation hook: model the DMA engine filling RX slot `idx`, as
    /// real silicon would via bus mastering (spec §4.3 receive algorithm
    /// step 1).
    pub fn simulate_rx_fill(&mut self, idx: usize, data: &[u8], first: bool, last: bool, error: bool) {
        self.rx.fill(idx, data, first, last, error);
    }

    /// Test/simulation hook: model the DMA engine completing TX slot `idx`.
    pub fn simulate_tx_complete(&mut self, idx: usize, error: bool) {
        self.tx.on_tx_complete(idx, error);
    }

    pub fn tx_queue_depth(&self) -> usize {
        self.tx.queued()
    }
}

impl<const TX_N: usize, const RX_N: usize, const SLOT_SIZE: usize> Default
    for DmaMac<TX_N, RX_N, SLOT_SIZE>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const TX_N: usize, const RX_N: usize, const SLOT_SIZE: usize> NicDriver
    for DmaMac<TX_N, RX_N, SLOT_SIZE>
{
    fn capabilities(&self) -> NicCapabilities {
        NicCapabilities {
            computes_ipv4_checksum: false,
            computes_tcp_checksum: false,
            computes_udp_checksum: false,
            port_tagging_supported: false,
        }
    }

    fn init(&mut self, _iface: &NetworkInterface) -> NicResult<()> {
        self.tx = TxRing::new();
        self.rx = RxRing::new();
        debug!("dma_mac: rings reset, tx_n={} rx_n={}", TX_N, RX_N);
        Ok(())
    }

    fn tick(&mut self, _iface: &NetworkInterface) -> NicResult<()> {
        Ok(())
    }

    fn enable_irq(&mut self, _iface: &NetworkInterface) {
        self.irq_enabled = true;
    }

    fn disable_irq(&mut self, _iface: &NetworkInterface) {
        self.irq_enabled = false;
    }

    /// Drain every completed RX descriptor before returning (spec §4.2:
    /// "deferred-context drain ... must not suspend indefinitely").
    fn event_handler(&mut self, iface: &NetworkInterface) {
        let mut scratch = [0u8; SLOT_SIZE];
        loop {
            match self.rx.recv_into(&mut scratch) {
                Ok(len) => {
                    iface.process_packet(&scratch[..len], Ancillary::default());
                }
                Err(NicError::BufferEmpty) => break,
                Err(e) => {
                    // malformed descriptor already recycled; surface once
                    // and keep draining (spec §4.3 failure semantics).
                    iface.report_error(e);
                }
            }
        }
    }

    fn send_packet(
        &mut self,
        iface: &NetworkInterface,
        buffer: &Buffer<'_>,
        offset: usize,
        _ancillary: Ancillary,
    ) -> NicResult<()> {
        let mut linear = [0u8; SLOT_SIZE];
        let len = buffer.len().saturating_sub(offset);
        if len > SLOT_SIZE {
            return Err(NicError::LengthInvalid);
        }
        let n = buffer.read(offset, &mut linear[..len]);
        let next_slot_free = self.tx.send(&linear[..n])?;
        if next_slot_free {
            iface.tx_ready.set();
        }
        Ok(())
    }

    fn update_filter(&mut self, iface: &NetworkInterface) -> NicResult<()> {
        let program = iface
            .filters()
            .rebuild(iface.promiscuous(), iface.accept_all_multicast());
        trace!(
            "dma_mac: filter rebuilt, {} perfect slots, promiscuous={}",
            program.perfect_slots.len(),
            program.promiscuous
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iface::test_support::RecordingStack;

    #[test]
    fn event_handler_delivers_every_completed_frame_in_order() {
        let stack = RecordingStack::default();
        let iface = NetworkInterface::new([1; 6], 1500, &stack);
        let mut mac: DmaMac<4, 4, 128> = DmaMac::new();

        mac.simulate_rx_fill(0, b"one", true, true, false);
        mac.simulate_rx_fill(1, b"two", true, true, false);
        mac.event_handler(&iface);

        let delivered = stack.delivered.borrow();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].0.as_slice(), b"one");
        assert_eq!(delivered[1].0.as_slice(), b"two");
    }

    #[test]
    fn event_handler_reports_errored_descriptor_and_keeps_draining() {
        let stack = RecordingStack::default();
        let iface = NetworkInterface::new([1; 6], 1500, &stack);
        let mut mac: DmaMac<4, 4, 128> = DmaMac::new();

        mac.simulate_rx_fill(0, b"bad", true, true, true);
        mac.simulate_rx_fill(1, b"good", true, true, false);
        mac.event_handler(&iface);

        assert_eq!(stack.delivered.borrow().len(), 1);
        assert_eq!(stack.delivered.borrow()[0].0.as_slice(), b"good");
        assert_eq!(
            stack.errors.borrow().as_slice(),
            &[NicError::InvalidPacket]
        );
    }

    #[test]
    fn send_packet_asserts_tx_ready_while_slots_remain() {
        let stack = RecordingStack::default();
        let iface = NetworkInterface::new([1; 6], 1500, &stack);
        let mut mac: DmaMac<2, 2, 64> = DmaMac::new();

        let mut storage = [0xAAu8; 32];
        let buf = Buffer::single(&mut storage, 32);
        mac.send_packet(&iface, &buf, 0, Ancillary::default()).unwrap();
        assert!(iface.tx_ready.take());
    }

    #[test]
    fn oversized_send_is_length_invalid() {
        let stack = RecordingStack::default();
        let iface = NetworkInterface::new([1; 6], 1500, &stack);
        let mut mac: DmaMac<2, 2, 16> = DmaMac::new();

        let mut storage = [0u8; 32];
        let buf = Buffer::single(&mut storage, 32);
        assert_eq!(
            mac.send_packet(&iface, &buf, 0, Ancillary::default()),
            Err(NicError::LengthInvalid)
        );
    }
}
