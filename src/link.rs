//! Link reconciliation (spec §4.4): the sequence a PHY or switch driver
//! runs whenever it observes a change — read resolved status, write it into
//! the interface, align the MAC, then tell the upper stack. Spec §8
//! property 8 pins the ordering: `update_mac_config` before
//! `notify_link_change`, and exactly one of each per transition.

use crate::driver::NicDriver;
use crate::error::NicResult;
use crate::iface::{Duplex, LinkState, NetworkInterface, Speed};

/// What a PHY/switch status register resolves to once autonegotiation (or
/// a fixed-link strap) settles.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResolvedLink {
    pub speed: Speed,
    pub duplex: Duplex,
}

/// Anything that can report the current resolved link state: a PHY's basic
/// status register, a switch port's link register, or a fixed-link stub
/// that always reports the same value.
pub trait LinkStatusReader {
    fn read_link_status(&mut self) -> NicResult<Option<ResolvedLink>>;
}

/// Run one reconciliation pass. A no-op if the observed state matches what
/// the interface already holds (spec §8 property 8: "a link state that has
/// not changed causes neither call").
pub fn reconcile<D: NicDriver, R: LinkStatusReader>(
    iface: &NetworkInterface,
    mac: &mut D,
    phy: &mut R,
) -> NicResult<()> {
    let observed = phy.read_link_status()?;
    let new_state = match observed {
        Some(ResolvedLink { speed, duplex }) => LinkState::Up(speed, duplex),
        None => LinkState::Down,
    };
    if new_state == iface.link_state() {
        return Ok(());
    }

    iface.write_link_state(new_state);
    if new_state.is_up() {
        mac.update_mac_config(iface)?;
    }
    iface.notify_link_change();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::driver::{Ancillary, NicCapabilities};
    use crate::error::NicError;
    use crate::iface::test_support::RecordingStack;
    use core::cell::RefCell;

    struct CountingMac {
        update_mac_config_calls: u32,
    }

    impl NicDriver for CountingMac {
        fn capabilities(&self) -> NicCapabilities {
            NicCapabilities::default()
        }
        fn init(&mut self, _iface: &NetworkInterface) -> NicResult<()> {
            Ok(())
        }
        fn tick(&mut self, _iface: &NetworkInterface) -> NicResult<()> {
            Ok(())
        }
        fn enable_irq(&mut self, _iface: &NetworkInterface) {}
        fn disable_irq(&mut self, _iface: &NetworkInterface) {}
        fn event_handler(&mut self, _iface: &NetworkInterface) {}
        fn send_packet(
            &mut self,
            _iface: &NetworkInterface,
            _buffer: &Buffer<'_>,
            _offset: usize,
            _ancillary: Ancillary,
        ) -> NicResult<()> {
            Ok(())
        }
        fn update_filter(&mut self, _iface: &NetworkInterface) -> NicResult<()> {
            Ok(())
        }
        fn update_mac_config(&mut self, _iface: &NetworkInterface) -> NicResult<()> {
            self.update_mac_config_calls += 1;
            Ok(())
        }
    }

    struct ScriptedReader {
        responses: RefCell<heapless::spsc::Queue<Option<ResolvedLink>, 4>>,
    }

    impl LinkStatusReader for ScriptedReader {
        fn read_link_status(&mut self) -> NicResult<Option<ResolvedLink>> {
            self.responses
                .borrow_mut()
                .dequeue()
                .ok_or(NicError::Timeout)
        }
    }

    fn script(states: &[Option<ResolvedLink>]) -> ScriptedReader {
        let mut q = heapless::spsc::Queue::new();
        for s in states {
            let _ = q.enqueue(*s);
        }
        ScriptedReader {
            responses: RefCell::new(q),
        }
    }

    #[test]
    fn link_up_calls_update_mac_config_before_notify() {
        let stack = RecordingStack::default();
        let iface = NetworkInterface::new([1; 6], 1500, &stack);
        let mut mac = CountingMac {
            update_mac_config_calls: 0,
        };
        let up = ResolvedLink {
            speed: Speed::Mbit100,
            duplex: Duplex::Full,
        };
        let mut reader = script(&[Some(up)]);

        reconcile(&iface, &mut mac, &mut reader).unwrap();

        assert_eq!(mac.update_mac_config_calls, 1);
        assert_eq!(*stack.link_changes.borrow(), 1);
        assert!(iface.link_state().is_up());
    }

    #[test]
    fn repeated_observation_of_same_state_is_a_no_op() {
        let stack = RecordingStack::default();
        let iface = NetworkInterface::new([1; 6], 1500, &stack);
        let mut mac = CountingMac {
            update_mac_config_calls: 0,
        };
        let up = ResolvedLink {
            speed: Speed::Mbit10,
            duplex: Duplex::Half,
        };
        let mut reader = script(&[Some(up), Some(up)]);

        reconcile(&iface, &mut mac, &mut reader).unwrap();
        reconcile(&iface, &mut mac, &mut reader).unwrap();

        assert_eq!(mac.update_mac_config_calls, 1);
        assert_eq!(*stack.link_changes.borrow(), 1);
    }

    #[test]
    fn link_down_notifies_without_touching_mac_config() {
        let stack = RecordingStack::default();
        let iface = NetworkInterface::new([1; 6], 1500, &stack);
        let mut mac = CountingMac {
            update_mac_config_calls: 0,
        };
        let up = ResolvedLink {
            speed: Speed::Mbit1000,
            duplex: Duplex::Full,
        };
        let mut reader = script(&[Some(up), None]);

        reconcile(&iface, &mut mac, &mut reader).unwrap();
        reconcile(&iface, &mut mac, &mut reader).unwrap();

        assert_eq!(mac.update_mac_config_calls, 1);
        assert_eq!(*stack.link_changes.borrow(), 2);
        assert_eq!(iface.link_state(), LinkState::Down);
    }
}
