//! C2 — the NIC driver contract, re-expressed as traits (spec §4.2, §9:
//! "Re-express as a capability set"). Every controller family implements
//! `NicDriver`; PHYs and switches implement `PhyDriver` / `SwitchDriver`.
//! Optional capabilities (hardware checksums, tag/untag) are separate small
//! traits so a driver only advertises what it actually has.

use crate::buffer::Buffer;
use crate::error::NicResult;
use crate::iface::NetworkInterface;

/// Ancillary data delivered alongside a frame: anything the driver knows
/// about a packet beyond its bytes (currently just the tail-tag source
/// port, spec §4.4).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Ancillary {
    pub source_port: Option<u8>,
}

/// Capability flags a `NicDriver` advertises (spec §3 `NicDriver`).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NicCapabilities {
    pub computes_ipv4_checksum: bool,
    pub computes_tcp_checksum: bool,
    pub computes_udp_checksum: bool,
    pub port_tagging_supported: bool,
}

/// The uniform operation set every controller family satisfies (spec §4.2).
pub trait NicDriver {
    fn capabilities(&self) -> NicCapabilities;

    /// Soft-reset, program the station address, initialize rings/FIFO
    /// pointers, clear/arm interrupts, leave TX/RX enabled. Fails with
    /// `invalid_parameter` if no PHY/switch is bound and the controller is
    /// not a fixed-link variant.
    fn init(&mut self, iface: &NetworkInterface) -> NicResult<()>;

    /// Called roughly once per 10ms budget. Acts as the link poller when no
    /// PHY interrupt is wired; fixed-link controllers assert link-up once.
    fn tick(&mut self, iface: &NetworkInterface) -> NicResult<()>;

    /// Arm the MAC interrupt (and forward to PHY/switch if present).
    /// Idempotent.
    fn enable_irq(&mut self, iface: &NetworkInterface);

    /// Mask the MAC interrupt (and forward to PHY/switch if present).
    /// Idempotent.
    fn disable_irq(&mut self, iface: &NetworkInterface);

    /// Deferred-context drain: pull RX packets until the source is empty,
    /// delivering each via `iface.process_packet`. Must not suspend
    /// indefinitely.
    fn event_handler(&mut self, iface: &NetworkInterface);

    /// Copy `buffer[offset..]` into the next TX slot and hand ownership to
    /// the engine. Fails with `length_invalid` if the frame exceeds the
    /// slot size, or `transient_busy` if no slot is free.
    fn send_packet(
        &mut self,
        iface: &NetworkInterface,
        buffer: &Buffer<'_>,
        offset: usize,
        ancillary: Ancillary,
    ) -> NicResult<()>;

    /// Rebuild hardware filters from `iface`'s software filter table
    /// (spec §4.4).
    fn update_filter(&mut self, iface: &NetworkInterface) -> NicResult<()>;

    /// Align the MAC's speed/duplex registers with the interface's current
    /// reconciled link state. `None` for drivers with no separate MAC/PHY
    /// split (e.g. a fixed-function serial-attached part).
    fn update_mac_config(&mut self, _iface: &NetworkInterface) -> NicResult<()> {
        Ok(())
    }

    fn read_phy_reg(&mut self, _phy_addr: u8, _reg_addr: u8) -> NicResult<u16> {
        Err(crate::error::NicError::InvalidParameter)
    }

    fn write_phy_reg(&mut self, _phy_addr: u8, _reg_addr: u8, _data: u16) -> NicResult<()> {
        Err(crate::error::NicError::InvalidParameter)
    }
}

/// A standalone PHY transceiver (spec §3 `PhyDriver`).
pub trait PhyDriver {
    fn init(&mut self, iface: &NetworkInterface) -> NicResult<()>;
    fn tick(&mut self, iface: &NetworkInterface);
    fn enable_irq(&mut self, iface: &NetworkInterface);
    fn disable_irq(&mut self, iface: &NetworkInterface);
    fn event_handler(&mut self, iface: &NetworkInterface);
}

/// An integrated multi-port switch fronting the MAC, presenting itself to
/// the link manager like a PHY (spec: GLOSSARY "Switch driver").
pub trait SwitchDriver {
    fn init(&mut self, iface: &NetworkInterface) -> NicResult<()>;
    fn tick(&mut self, iface: &NetworkInterface);
    fn enable_irq(&mut self, iface: &NetworkInterface);
    fn disable_irq(&mut self, iface: &NetworkInterface);
    fn event_handler(&mut self, iface: &NetworkInterface);
}

/// Tail-tag capable switch (spec §4.4 switch port tagging).
pub trait PortTagging {
    /// Append the destination-port tail tag. `buffer` must already be
    /// padded to the minimum frame length so the tag never lands inside
    /// the padding.
    fn tag_frame(&self, buffer: &mut Buffer<'_>, port: u8) -> NicResult<()>;

    /// Strip the source-port tail tag from a received `frame`, returning the
    /// decoded source port and the length of the payload with the tag byte
    /// removed.
    fn untag_frame(&self, frame: &[u8]) -> NicResult<(u8, usize)>;
}
