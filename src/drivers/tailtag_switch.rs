//! A small tail-tagging switch fronting the MAC (spec GLOSSARY "Switch
//! driver"), register access grounded in the same read/write-over-SPI
//! idiom a KSZ-family switch uses, but configured for tail-tag mode
//! instead of that family's native 802.1Q tagging (spec §9: grounds the
//! register-access idiom, not the tagging scheme).

use crate::driver::SwitchDriver;
use crate::error::{NicError, NicResult};
use crate::iface::{Duplex, NetworkInterface, Speed};
use crate::link::{LinkStatusReader, ResolvedLink};
use crate::serial::SpiTransport;
use crate::switch::TailTagSwitch;

const REG_CHIP_ID: u8 = 0x00;
const REG_GLOBAL_CTRL_TAIL_TAG: u8 = 0x0C;
const REG_PORT1_STATUS: u8 = 0x30;
/// Per-port learning/forwarding control. With tail tagging enabled the
/// switch fabric must not make its own forwarding decisions — the host
/// CPU picks the destination port via the tail tag on every frame it
/// sends, so both bits are cleared in `init`.
const REG_PORT_LEARN_FWD_CTRL: u8 = 0x10;
const PORT_LEARN_ENABLE: u8 = 0x01;
const PORT_FORWARD_ENABLE: u8 = 0x02;

const EXPECTED_CHIP_ID: u8 = 0x84;

pub struct TailTagSwitchDriver<T> {
    transport: T,
    pub tagging: TailTagSwitch,
}

impl<T: SpiTransport> TailTagSwitchDriver<T> {
    pub fn new(transport: T, port_count: u8) -> Self {
        TailTagSwitchDriver {
            transport,
            tagging: TailTagSwitch::new(port_count),
        }
    }

    fn read_reg(&mut self, addr: u8) -> NicResult<u8> {
        let mut rx = [0u8; 3];
        self.transport
            .transfer(&[0x60, addr, 0], &mut rx)?;
        Ok(rx[2])
    }

    fn write_reg(&mut self, addr: u8, value: u8) -> NicResult<()> {
        let mut rx = [0u8; 3];
        self.transport.transfer(&[0x40, addr, value], &mut rx)
    }

    fn modify_reg(&mut self, addr: u8, set: u8, clear: u8) -> NicResult<()> {
        let current = self.read_reg(addr)?;
        self.write_reg(addr, (current & !clear) | set)
    }
}

impl<T: SpiTransport> SwitchDriver for TailTagSwitchDriver<T> {
    fn init(&mut self, _iface: &NetworkInterface) -> NicResult<()> {
        let id = self.read_reg(REG_CHIP_ID)?;
        if id != EXPECTED_CHIP_ID {
            return Err(NicError::InvalidParameter);
        }
        self.modify_reg(REG_GLOBAL_CTRL_TAIL_TAG, 0x01, 0x00)?;
        // Hand forwarding entirely to the host: the fabric must neither
        // learn source addresses nor forward on its own once every frame
        // carries an explicit destination port in its tail tag.
        self.modify_reg(
            REG_PORT_LEARN_FWD_CTRL,
            0x00,
            PORT_LEARN_ENABLE | PORT_FORWARD_ENABLE,
        )
    }

    fn tick(&mut self, _iface: &NetworkInterface) {}
    fn enable_irq(&mut self, _iface: &NetworkInterface) {}
    fn disable_irq(&mut self, _iface: &NetworkInterface) {}
    fn event_handler(&mut self, _iface: &NetworkInterface) {}
}

/// Port 1's link status register as a `LinkStatusReader`, so
/// `link::reconcile` can drive this switch exactly like a standalone PHY.
impl<T: SpiTransport> LinkStatusReader for TailTagSwitchDriver<T> {
    fn read_link_status(&mut self) -> NicResult<Option<ResolvedLink>> {
        let status = self.read_reg(REG_PORT1_STATUS)?;
        let up = status & 0x01 != 0;
        if !up {
            return Ok(None);
        }
        let speed = if status & 0x02 != 0 {
            Speed::Mbit100
        } else {
            Speed::Mbit10
        };
        let duplex = if status & 0x04 != 0 {
            Duplex::Full
        } else {
            Duplex::Half
        };
        Ok(Some(ResolvedLink { speed, duplex }))
    }
}
