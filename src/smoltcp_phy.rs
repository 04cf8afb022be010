//! An optional `smoltcp::phy::Device` adapter (spec §9 ambient stack),
//! gated behind the `smoltcp_phy` feature exactly as the reference driver
//! gates its own. `smoltcp` pulls frames rather than having them pushed at
//! it, so received frames are staged into a small fixed-capacity queue by
//! a [`QueuedStack`] until `receive()` is next polled.

use heapless::spsc::Queue;
use smoltcp::phy::{self, Device, DeviceCapabilities, Medium};
use smoltcp::time::Instant;

use crate::driver::{Ancillary, NicDriver};
use crate::iface::{MacAddress, NetworkInterface, UpwardStack};

const MAX_FRAME_LEN: usize = 1536;
const RX_QUEUE_DEPTH: usize = 8;

type StagedFrame = (heapless::Vec<u8, MAX_FRAME_LEN>, Ancillary);

/// An `UpwardStack` that stages inbound frames instead of forwarding them
/// anywhere — the bridge between the deferred-context `event_handler` drain
/// and smoltcp's pull-based `receive()`.
pub struct QueuedStack {
    queue: core::cell::RefCell<Queue<StagedFrame, RX_QUEUE_DEPTH>>,
}

impl QueuedStack {
    pub fn new() -> Self {
        QueuedStack {
            queue: core::cell::RefCell::new(Queue::new()),
        }
    }
}

impl Default for QueuedStack {
    fn default() -> Self {
        Self::new()
    }
}

impl UpwardStack for QueuedStack {
    fn process_packet(&self, payload: &[u8], ancillary: Ancillary) {
        let mut frame = heapless::Vec::new();
        if frame.extend_from_slice(payload).is_err() {
            return; // oversized frame, dropped rather than panicking
        }
        // A full queue drops the newest frame; smoltcp's own retransmission
        // (or the upper protocol's) recovers from the loss.
        let _ = self.queue.borrow_mut().enqueue((frame, ancillary));
    }

    fn notify_link_change(&self) {}

    fn report_error(&self, error: crate::error::NicError) {
        log::warn!("dropped packet: {}", error);
    }
}

/// Bridges one `NicDriver` + `NetworkInterface` pair into smoltcp's `Device`
/// trait. The caller must still run `driver.event_handler(iface)` (which
/// feeds `QueuedStack`) before polling `receive()`.
pub struct SmoltcpDevice<'a, D> {
    driver: &'a mut D,
    iface: &'a NetworkInterface<'a>,
    stack: &'a QueuedStack,
    mac_address: MacAddress,
}

impl<'a, D: NicDriver> SmoltcpDevice<'a, D> {
    pub fn new(driver: &'a mut D, iface: &'a NetworkInterface<'a>, stack: &'a QueuedStack) -> Self {
        SmoltcpDevice {
            mac_address: iface.mac_address(),
            driver,
            iface,
            stack,
        }
    }
}

pub struct RxToken {
    frame: heapless::Vec<u8, MAX_FRAME_LEN>,
}

impl phy::RxToken for RxToken {
    fn consume<R, F>(mut self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(&mut self.frame)
    }
}

pub struct TxToken<'a, D> {
    driver: &'a mut D,
    iface: &'a NetworkInterface<'a>,
}

impl<'a, D: NicDriver> phy::TxToken for TxToken<'a, D> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut storage = [0u8; MAX_FRAME_LEN];
        let result = f(&mut storage[..len.min(MAX_FRAME_LEN)]);
        let buffer = crate::buffer::Buffer::single(&mut storage, len.min(MAX_FRAME_LEN));
        let _ = self
            .driver
            .send_packet(self.iface, &buffer, 0, Ancillary::default());
        result
    }
}

impl<'a, D: NicDriver> Device for SmoltcpDevice<'a, D> {
    type RxToken<'b> = RxToken where Self: 'b;
    type TxToken<'b> = TxToken<'b, D> where Self: 'b;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        let (frame, _ancillary) = self.stack.queue.borrow_mut().dequeue()?;
        Some((
            RxToken { frame },
            TxToken {
                driver: self.driver,
                iface: self.iface,
            },
        ))
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        Some(TxToken {
            driver: self.driver,
            iface: self.iface,
        })
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.max_transmission_unit = self.iface.mtu();
        caps.medium = Medium::Ethernet;
        caps
    }
}

impl<'a, D> SmoltcpDevice<'a, D> {
    pub fn mac_address(&self) -> MacAddress {
        self.mac_address
    }
}
