//! C4 (filter half) — MAC address filtering: perfect-match slots plus a
//! CRC-32 hashed multicast table (spec §3 `MacFilterEntry`, §4.4 "MAC
//! filter rebuild").
//!
//! The CRC-32 final-inversion choice is preserved per controller family
//! rather than normalized away (spec §9's explicit open question): `invert`
//! is a field on `FilterTable`, not a global constant.

use crate::error::{NicError, NicResult};
use crate::iface::MacAddress;

/// Perfect-match slots available beyond slot 0 (which always holds the
/// station address while non-promiscuous). Spec §4.4: "K is typically 3 or
/// 7 depending on family."
pub const PERFECT_MATCH_SLOTS: usize = 7;

/// Bound on additional multicast group memberships tracked in software.
pub const MAX_MULTICAST_ENTRIES: usize = 32;

/// An entry in the software filter table (spec §3 `MacFilterEntry`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MacFilterEntry {
    pub address: MacAddress,
    ref_count: u32,
}

impl MacFilterEntry {
    pub fn is_active(&self) -> bool {
        self.ref_count > 0
    }
}

/// `true` if `addr` is a multicast (group) address — the I/G bit (LSB of
/// the first octet) is set.
pub fn is_multicast(addr: &MacAddress) -> bool {
    addr[0] & 0x01 != 0
}

/// CRC-32, polynomial `0x04C11DB7`, initial value `0xFFFFFFFF`, computed
/// with the conventional reflected (LSB-first per byte) Ethernet CRC
/// algorithm. `invert` selects whether the final value is complemented
/// before the hash index is extracted — some controller families do, some
/// don't (spec §9), and that difference is never "fixed" away.
pub fn crc32_mac(addr: &MacAddress, invert: bool) -> u32 {
    const POLY: u32 = 0xEDB8_8320; // bit-reversal of 0x04C1_1DB7
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in addr.iter() {
        let mut c = byte as u32;
        for _ in 0..8 {
            if (crc ^ c) & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
            c >>= 1;
        }
    }
    if invert {
        !crc
    } else {
        crc
    }
}

/// Upper 6 bits of the CRC select a bit in the 64-bit hash word (spec §8
/// property 5: `hash_index(m) == (crc32_be(m) >> 26) & 0x3F`).
pub fn hash_index(crc: u32) -> u8 {
    ((crc >> 26) & 0x3F) as u8
}

/// The hardware programming a filter rebuild produces: what `update_filter`
/// (spec §4.2) writes into the controller's registers.
#[derive(Clone, Debug, Default)]
pub struct FilterProgram {
    /// Pass every frame; all other fields are meaningless when set.
    pub promiscuous: bool,
    /// Perfect-match slots beyond slot 0 (the station address), earliest
    /// added first. Overflow beyond `PERFECT_MATCH_SLOTS` is silently
    /// dropped (spec §4.4 tie-break).
    pub perfect_slots: heapless::Vec<MacAddress, PERFECT_MATCH_SLOTS>,
    pub hash_word: u64,
    pub pass_all_multicast: bool,
}

/// Software-side filter table backing one `NetworkInterface` (spec §3:
/// "bounded size").
pub struct FilterTable {
    station_address: MacAddress,
    /// Per-family CRC inversion choice (spec §9).
    invert_crc: bool,
    unicast: heapless::Vec<MacFilterEntry, PERFECT_MATCH_SLOTS>,
    multicast: heapless::Vec<MacFilterEntry, MAX_MULTICAST_ENTRIES>,
}

impl FilterTable {
    pub fn new(station_address: MacAddress) -> Self {
        FilterTable {
            station_address,
            invert_crc: false,
            unicast: heapless::Vec::new(),
            multicast: heapless::Vec::new(),
        }
    }

    pub fn with_crc_inversion(mut self, invert: bool) -> Self {
        self.invert_crc = invert;
        self
    }

    pub fn station_address(&self) -> MacAddress {
        self.station_address
    }

    pub fn set_station_address(&mut self, addr: MacAddress) {
        self.station_address = addr;
    }

    /// Join a group (multicast) or add a secondary unicast address. Called
    /// on a reference-count increment from zero (spec §3 filter-entry
    /// lifecycle: "created on join").
    pub fn add(&mut self, address: MacAddress) -> NicResult<()> {
        if is_multicast(&address) {
            if let Some(entry) = self.multicast.iter_mut().find(|e| e.address == address) {
                entry.ref_count += 1;
                return Ok(());
            }
            self.multicast
                .push(MacFilterEntry { address, ref_count: 1 })
                .map_err(|_| NicError::OutOfResources)
        } else {
            if let Some(entry) = self.unicast.iter_mut().find(|e| e.address == address) {
                entry.ref_count += 1;
                return Ok(());
            }
            // Overflow beyond capacity is the documented lossy policy
            // (spec §4.4): silently drop rather than error the stack.
            let _ = self
                .unicast
                .push(MacFilterEntry { address, ref_count: 1 });
            Ok(())
        }
    }

    /// Leave a group / drop a secondary address. The entry is destroyed
    /// once the reference count reaches zero (spec §3).
    pub fn remove(&mut self, address: MacAddress) -> NicResult<()> {
        let table = if is_multicast(&address) {
            &mut self.multicast
        } else {
            return Ok(Self::remove_from(&mut self.unicast, address));
        };
        Self::remove_from(table, address);
        Ok(())
    }

    fn remove_from<const N: usize>(
        table: &mut heapless::Vec<MacFilterEntry, N>,
        address: MacAddress,
    ) {
        if let Some(entry) = table.iter_mut().find(|e| e.address == address) {
            if entry.ref_count > 0 {
                entry.ref_count -= 1;
            }
        }
        table.retain(|e| e.is_active());
    }

    /// Rebuild the hardware filter program from the current software table
    /// (spec §4.4 algorithm):
    /// 1. promiscuous => pass everything.
    /// 2. slot 0 is always the station address.
    /// 3. walk active entries: multicast hashes into the 64-bit word,
    ///    unicast takes the next perfect-match slot while slots remain.
    /// 4/5. write hash word and the pass/hash-multicast mode.
    pub fn rebuild(&self, promiscuous: bool, accept_all_multicast: bool) -> FilterProgram {
        if promiscuous {
            return FilterProgram {
                promiscuous: true,
                ..Default::default()
            };
        }
        let mut program = FilterProgram {
            promiscuous: false,
            pass_all_multicast: accept_all_multicast,
            ..Default::default()
        };
        for entry in self.unicast.iter().filter(|e| e.is_active()) {
            if program.perfect_slots.push(entry.address).is_err() {
                // Earliest-added entries already in `perfect_slots` win;
                // this overflow is silently dropped (spec §4.4 tie-break).
                break;
            }
        }
        for entry in self.multicast.iter().filter(|e| e.is_active()) {
            let crc = crc32_mac(&entry.address, self.invert_crc);
            let bit = hash_index(crc);
            program.hash_word |= 1u64 << bit;
        }
        program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_index_matches_documented_formula() {
        let addr = [0x01, 0x00, 0x5e, 0x00, 0x00, 0x01];
        let crc = crc32_mac(&addr, false);
        assert_eq!(hash_index(crc), ((crc >> 26) & 0x3F) as u8);
    }

    /// Pins `crc32_mac`/`hash_index`'s literal output for two well-known
    /// IPv4 multicast groups (224.0.0.1's and 224.0.0.251's MAC-layer
    /// addresses), so a change to the polynomial, bit order, or extraction
    /// window shows up as a failing assertion rather than only a formula
    /// re-derivation that can't catch a wrong implementation of itself.
    #[test]
    fn hash_index_literal_values_for_well_known_multicast_groups() {
        let all_hosts = [0x01, 0x00, 0x5e, 0x00, 0x00, 0x01];
        let mdns = [0x01, 0x00, 0x5e, 0x00, 0x00, 0xFB];
        assert_eq!(hash_index(crc32_mac(&all_hosts, false)), 0x36);
        assert_eq!(hash_index(crc32_mac(&mdns, false)), 0x21);
    }

    #[test]
    fn add_then_remove_restores_hash_word() {
        let station = [0xAA; 6];
        let mut table = FilterTable::new(station);
        let before = table.rebuild(false, false).hash_word;

        let group = [0x01, 0x00, 0x5e, 0x00, 0x00, 0x01];
        table.add(group).unwrap();
        let during = table.rebuild(false, false).hash_word;
        assert_ne!(before, during);

        table.remove(group).unwrap();
        let after = table.rebuild(false, false).hash_word;
        assert_eq!(before, after);
    }

    #[test]
    fn station_address_slot_always_present_non_promiscuous() {
        let station = [1, 2, 3, 4, 5, 6];
        let table = FilterTable::new(station);
        assert_eq!(table.station_address(), station);
        let program = table.rebuild(false, false);
        assert!(!program.promiscuous);
    }

    #[test]
    fn perfect_slots_drop_overflow_earliest_added_wins() {
        let mut table = FilterTable::new([0; 6]);
        for i in 0..(PERFECT_MATCH_SLOTS as u8 + 3) {
            table.add([0x02, 0, 0, 0, 0, i]).unwrap();
        }
        let program = table.rebuild(false, false);
        assert_eq!(program.perfect_slots.len(), PERFECT_MATCH_SLOTS);
        assert_eq!(program.perfect_slots[0], [0x02, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn promiscuous_short_circuits_rebuild() {
        let mut table = FilterTable::new([0; 6]);
        table.add([0x01, 0, 0, 0, 0, 1]).unwrap();
        let program = table.rebuild(true, false);
        assert!(program.promiscuous);
        assert_eq!(program.hash_word, 0);
    }
}
