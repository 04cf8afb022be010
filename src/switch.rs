//! C4 (switch half) — tail-tag port tagging and routing to virtual
//! sub-interfaces (spec §4.4 "switch port tagging"). Distinct from 802.1Q
//! VLAN tagging: a single trailer byte carries the destination (egress) or
//! source (ingress) port, appended after the frame has already been padded
//! to the minimum Ethernet length so the tag never lands inside the
//! padding (spec §8 property 9, scenario S3).

use crate::buffer::{pad_frame, Buffer, MIN_ETHERNET_FRAME_LEN};
use crate::driver::{Ancillary, PortTagging};
use crate::error::{NicError, NicResult};
use crate::iface::NetworkInterface;

/// A switch that appends/strips a one-byte destination/source port tag on
/// every frame crossing the MAC boundary.
pub struct TailTagSwitch {
    port_count: u8,
}

impl TailTagSwitch {
    pub fn new(port_count: u8) -> Self {
        TailTagSwitch { port_count }
    }

    pub fn port_count(&self) -> u8 {
        self.port_count
    }
}

impl PortTagging for TailTagSwitch {
    fn tag_frame(&self, buffer: &mut Buffer<'_>, port: u8) -> NicResult<()> {
        if port >= self.port_count {
            return Err(NicError::InvalidParameter);
        }
        // Pad to the minimum length *before* the tag so a short frame's
        // zero padding never eats into the tag byte (spec §4.4 ordering).
        pad_frame(buffer)?;
        buffer.append(&[port])
    }

    fn untag_frame(&self, frame: &[u8]) -> NicResult<(u8, usize)> {
        if frame.is_empty() {
            return Err(NicError::InvalidPacket);
        }
        let tag_index = frame.len() - 1;
        let port = frame[tag_index];
        if port >= self.port_count {
            return Err(NicError::InvalidPacket);
        }
        Ok((port, tag_index))
    }
}

/// Deliver a tagged, received frame to whichever of `ifaces` owns the
/// source port the tag names (spec §9: "several virtual sub-interfaces
/// sharing one physical pipe"). Frames whose source port matches none of
/// them are dropped silently, mirroring an unconfigured switch port.
pub fn dispatch_by_port(
    switch: &TailTagSwitch,
    ifaces: &[&NetworkInterface],
    frame: &[u8],
) -> NicResult<()> {
    let (port, payload_len) = switch.untag_frame(frame)?;
    if let Some(iface) = ifaces.iter().find(|i| i.port_id() == Some(port)) {
        iface.process_packet(
            &frame[..payload_len],
            Ancillary {
                source_port: Some(port),
            },
        );
    }
    Ok(())
}
