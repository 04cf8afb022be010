//! §3 data model — `NetworkInterface`, link state, and the upward interface
//! to the IP stack (spec §6).
//!
//! The source's `NetworkInterface` holds a reference *to* its driver; per
//! the rearchitecture in spec §9 ("the interface is supplied to the driver
//! at construction"), this crate inverts that: a concrete driver struct
//! borrows `&NetworkInterface` on every call instead of the interface owning
//! a trait object of its driver. `NetworkInterface` is therefore pure shared
//! state — link configuration, flags, filter tables, the two rendezvous
//! signals — with interior mutability via `Cell`/`RefCell` because it's
//! written only from deferred context (spec §5: "ISR context reads none of
//! these").

use core::cell::{Cell, RefCell};

use crate::driver::Ancillary;
use crate::error::NicError;
use crate::filter::FilterTable;
use crate::signal::Signal;

pub type MacAddress = [u8; 6];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Speed {
    Mbit10,
    Mbit100,
    Mbit1000,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Duplex {
    Half,
    Full,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkState {
    Down,
    Up(Speed, Duplex),
}

impl LinkState {
    pub fn is_up(&self) -> bool {
        matches!(self, LinkState::Up(..))
    }
}

/// Upward collaborator: the IP stack above the NIC layer (spec §6).
/// Deliberately minimal — this crate stops at the boundary named in
/// spec §1's non-goals.
pub trait UpwardStack {
    /// Deliver an inbound Ethernet frame.
    fn process_packet(&self, payload: &[u8], ancillary: Ancillary);

    /// Link state changed; the stack should re-read `link_state()`.
    fn notify_link_change(&self);

    /// A driver hit a per-packet fault it could recover from by dropping
    /// the packet and continuing to drain (spec §4.3 failure semantics:
    /// surfaced once per fault, never panics, never stalls the drain).
    fn report_error(&self, error: NicError);
}

/// The binding object between a driver, a PHY/switch, and the upper stack
/// (spec §3 `NetworkInterface`).
pub struct NetworkInterface<'a> {
    mac_address: Cell<MacAddress>,
    mtu: Cell<usize>,
    link_state: Cell<LinkState>,
    promiscuous: Cell<bool>,
    accept_all_multicast: Cell<bool>,
    filters: RefCell<FilterTable>,
    /// Virtual port index over a tagged switch, if this interface is one of
    /// several sub-interfaces sharing one physical pipe (spec §9).
    port_id: Option<u8>,
    pub tx_ready: Signal,
    pub net_event: Signal,
    stack: &'a dyn UpwardStack,
}

impl<'a> NetworkInterface<'a> {
    pub fn new(mac_address: MacAddress, mtu: usize, stack: &'a dyn UpwardStack) -> Self {
        NetworkInterface {
            mac_address: Cell::new(mac_address),
            mtu: Cell::new(mtu),
            link_state: Cell::new(LinkState::Down),
            promiscuous: Cell::new(false),
            accept_all_multicast: Cell::new(false),
            filters: RefCell::new(FilterTable::new(mac_address)),
            port_id: None,
            tx_ready: Signal::new(),
            net_event: Signal::new(),
            stack,
        }
    }

    pub fn with_port_id(mut self, port_id: u8) -> Self {
        self.port_id = Some(port_id);
        self
    }

    pub fn port_id(&self) -> Option<u8> {
        self.port_id
    }

    pub fn mac_address(&self) -> MacAddress {
        self.mac_address.get()
    }

    pub fn set_mac_address(&self, addr: MacAddress) {
        self.mac_address.set(addr);
        self.filters.borrow_mut().set_station_address(addr);
    }

    pub fn mtu(&self) -> usize {
        self.mtu.get()
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state.get()
    }

    pub fn promiscuous(&self) -> bool {
        self.promiscuous.get()
    }

    pub fn set_promiscuous(&self, on: bool) {
        self.promiscuous.set(on);
    }

    pub fn accept_all_multicast(&self) -> bool {
        self.accept_all_multicast.get()
    }

    pub fn set_accept_all_multicast(&self, on: bool) {
        self.accept_all_multicast.set(on);
    }

    pub fn filters(&self) -> core::cell::Ref<'_, FilterTable> {
        self.filters.borrow()
    }

    pub fn filters_mut(&self) -> core::cell::RefMut<'_, FilterTable> {
        self.filters.borrow_mut()
    }

    /// Every transition (`down -> up(speed, duplex) -> down`) triggers a
    /// `notify_link_change`; aligning the MAC (`update_mac_config`) is the
    /// driver's job once this has been set, per spec §4.4's link
    /// reconciliation sequence.
    pub fn set_link_state(&self, state: LinkState) {
        self.link_state.set(state);
        self.stack.notify_link_change();
    }

    /// Write the link state without notifying. Used by `link::reconcile`,
    /// which must call the MAC's `update_mac_config` *between* the write and
    /// the notification (spec §8 property 8's ordering).
    pub(crate) fn write_link_state(&self, state: LinkState) {
        self.link_state.set(state);
    }

    pub(crate) fn notify_link_change(&self) {
        self.stack.notify_link_change();
    }

    pub fn process_packet(&self, payload: &[u8], ancillary: Ancillary) {
        self.stack.process_packet(payload, ancillary);
    }

    pub fn report_error(&self, error: NicError) {
        self.stack.report_error(error);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use core::cell::RefCell as StdRefCell;

    #[derive(Default)]
    pub struct RecordingStack {
        pub link_changes: StdRefCell<u32>,
        pub delivered: StdRefCell<heapless::Vec<(heapless::Vec<u8, 256>, Ancillary), 16>>,
        pub errors: StdRefCell<heapless::Vec<NicError, 16>>,
    }

    impl UpwardStack for RecordingStack {
        fn process_packet(&self, payload: &[u8], ancillary: Ancillary) {
            let mut v = heapless::Vec::new();
            let _ = v.extend_from_slice(payload);
            let _ = self.delivered.borrow_mut().push((v, ancillary));
        }

        fn notify_link_change(&self) {
            *self.link_changes.borrow_mut() += 1;
        }

        fn report_error(&self, error: NicError) {
            let _ = self.errors.borrow_mut().push(error);
        }
    }
}
