//! A W5100-style serial-attached controller (spec §4.5): TX and RX FIFOs
//! are flat, wrapping address spaces rather than banked registers, so a
//! frame can straddle the end of the buffer and come back in at offset
//! zero. `crate::serial::RingOffsets` carries the split arithmetic; this
//! driver just drives the SPI command framing around it.

use crate::buffer::Buffer;
use crate::driver::{Ancillary, NicCapabilities, NicDriver};
use crate::error::{NicError, NicResult};
use crate::iface::NetworkInterface;
use crate::serial::{read_u16_stable, RingOffsets, SpiTransport};

const READ: u8 = 0x0F;
const WRITE: u8 = 0xF0;

/// Socket 0's received-size register (`S0_RX_RSR`), a 16-bit big-endian
/// count the MAC updates outside the SPI clock domain as frames arrive.
const RX_RSR_HI: u16 = 0x0426;
const RX_RSR_LO: u16 = 0x0427;

pub struct W5100<T> {
    transport: T,
    tx_base: u16,
    rx_base: u16,
    ring: RingOffsets,
    tx_write_ptr: u16,
    rx_read_ptr: u16,
}

impl<T: SpiTransport> W5100<T> {
    /// `buffer_size` is the TX/RX FIFO size in bytes (a power of two — 1, 2,
    /// 4, or 8 KiB on real parts).
    pub fn new(transport: T, tx_base: u16, rx_base: u16, buffer_size: u16) -> Self {
        W5100 {
            transport,
            tx_base,
            rx_base,
            ring: RingOffsets::new(buffer_size),
            tx_write_ptr: 0,
            rx_read_ptr: 0,
        }
    }

    /// The received-size register is updated by the MAC's own state
    /// machine, not synchronously with the SPI bus — read it with the
    /// double-read-until-stable primitive (spec §9) rather than trusting a
    /// single snapshot.
    fn received_size(&mut self) -> NicResult<u16> {
        read_u16_stable(|| {
            let hi = self.read_byte(RX_RSR_HI)? as u16;
            let lo = self.read_byte(RX_RSR_LO)? as u16;
            Ok((hi << 8) | lo)
        })
    }

    fn write_byte(&mut self, addr: u16, value: u8) -> NicResult<()> {
        let mut rx = [0u8; 4];
        self.transport.transfer(
            &[WRITE, (addr >> 8) as u8, addr as u8, value],
            &mut rx,
        )
    }

    fn read_byte(&mut self, addr: u16) -> NicResult<u8> {
        let mut rx = [0u8; 4];
        self.transport
            .transfer(&[READ, (addr >> 8) as u8, addr as u8, 0], &mut rx)?;
        Ok(rx[3])
    }

    /// Write `frame` into the TX FIFO starting at the current write
    /// pointer, splitting across the wrap boundary if necessary (spec
    /// §4.5 "the controller's own pointer arithmetic wraps within the
    /// fixed-size window").
    fn write_tx_fifo(&mut self, frame: &[u8]) -> NicResult<()> {
        let (first_len, second_len) = self.ring.split(self.tx_write_ptr, frame.len() as u16);
        let offset = self.ring.mask(self.tx_write_ptr);

        for i in 0..first_len {
            self.write_byte(self.tx_base + offset + i, frame[i as usize])?;
        }
        for i in 0..second_len {
            self.write_byte(self.tx_base + i, frame[(first_len + i) as usize])?;
        }
        self.tx_write_ptr = self.tx_write_ptr.wrapping_add(frame.len() as u16);
        Ok(())
    }

    fn read_rx_fifo(&mut self, out: &mut [u8], len: u16) -> NicResult<()> {
        let (first_len, second_len) = self.ring.split(self.rx_read_ptr, len);
        let offset = self.ring.mask(self.rx_read_ptr);

        for i in 0..first_len {
            out[i as usize] = self.read_byte(self.rx_base + offset + i)?;
        }
        for i in 0..second_len {
            out[(first_len + i) as usize] = self.read_byte(self.rx_base + i)?;
        }
        self.rx_read_ptr = self.rx_read_ptr.wrapping_add(len);
        Ok(())
    }
}

impl<T: SpiTransport> NicDriver for W5100<T> {
    fn capabilities(&self) -> NicCapabilities {
        NicCapabilities {
            computes_ipv4_checksum: true,
            computes_tcp_checksum: true,
            computes_udp_checksum: true,
            port_tagging_supported: false,
        }
    }

    fn init(&mut self, _iface: &NetworkInterface) -> NicResult<()> {
        self.tx_write_ptr = 0;
        self.rx_read_ptr = 0;
        Ok(())
    }

    fn tick(&mut self, _iface: &NetworkInterface) -> NicResult<()> {
        Ok(())
    }

    fn enable_irq(&mut self, _iface: &NetworkInterface) {}
    fn disable_irq(&mut self, _iface: &NetworkInterface) {}

    fn event_handler(&mut self, iface: &NetworkInterface) {
        let available = match self.received_size() {
            Ok(n) => n,
            Err(_) => {
                log::warn!("w5100: received-size register never stabilized, skipping drain");
                return;
            }
        };
        if available == 0 {
            return;
        }
        let mut scratch = [0u8; 1536];
        let len = available.min(scratch.len() as u16);
        if self.read_rx_fifo(&mut scratch[..len as usize], len).is_ok() {
            iface.process_packet(&scratch[..len as usize], Ancillary::default());
        } else {
            iface.report_error(NicError::InvalidPacket);
        }
    }

    fn send_packet(
        &mut self,
        _iface: &NetworkInterface,
        buffer: &Buffer<'_>,
        offset: usize,
        _ancillary: Ancillary,
    ) -> NicResult<()> {
        let len = buffer.len().saturating_sub(offset);
        if len == 0 {
            return Err(NicError::LengthInvalid);
        }
        let mut linear = [0u8; 1536];
        if len > linear.len() {
            return Err(NicError::LengthInvalid);
        }
        let n = buffer.read(offset, &mut linear[..len]);
        self.write_tx_fifo(&linear[..n])
    }

    fn update_filter(&mut self, _iface: &NetworkInterface) -> NicResult<()> {
        Ok(())
    }
}
