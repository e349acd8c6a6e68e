//! In-memory interface table
//!
//! Interfaces with hardware addresses and an address list whose state
//! timers count down when [`MemoryStack::advance`] is called.

use crate::client::{AddressSource, InterfaceStack, NewAddress};
use crate::protocol::{HardwareAddr, InterfaceId};
use std::collections::BTreeMap;
use std::net::Ipv6Addr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    pub address: Ipv6Addr,
    pub prefix_len: u8,
    pub source: AddressSource,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
    pub deprecated: bool,
    /// Ticks left on the state timer, 0 = not armed
    pub state_timer: u32,
}

#[derive(Debug, Clone)]
struct SimInterface {
    hardware_address: HardwareAddr,
    addresses: Vec<AddressEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryStack {
    interfaces: BTreeMap<InterfaceId, SimInterface>,
    /// Refuse the next `add_address`
    pub fail_next_add: bool,
}

impl MemoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_interface(&mut self, interface: InterfaceId, hardware_address: HardwareAddr) {
        self.interfaces.insert(
            interface,
            SimInterface {
                hardware_address,
                addresses: Vec::new(),
            },
        );
    }

    pub fn remove_interface(&mut self, interface: InterfaceId) {
        self.interfaces.remove(&interface);
    }

    pub fn addresses(&self, interface: InterfaceId) -> &[AddressEntry] {
        self.interfaces
            .get(&interface)
            .map(|i| i.addresses.as_slice())
            .unwrap_or(&[])
    }

    pub fn address(&self, interface: InterfaceId, address: &Ipv6Addr) -> Option<&AddressEntry> {
        self.addresses(interface).iter().find(|e| e.address == *address)
    }

    fn entry_mut(&mut self, interface: InterfaceId, address: &Ipv6Addr) -> Option<&mut AddressEntry> {
        self.interfaces
            .get_mut(&interface)?
            .addresses
            .iter_mut()
            .find(|e| e.address == *address)
    }

    /// Shortest armed state timer, in ticks
    pub fn next_timer(&self) -> Option<u32> {
        self.interfaces
            .values()
            .flat_map(|i| i.addresses.iter())
            .map(|e| e.state_timer)
            .filter(|&t| t > 0)
            .min()
    }

    /// Let `ticks` pass; returns the addresses whose timer ran out
    pub fn advance(&mut self, ticks: u32) -> Vec<(InterfaceId, Ipv6Addr)> {
        let mut expired = Vec::new();
        for (&id, iface) in self.interfaces.iter_mut() {
            for entry in iface.addresses.iter_mut().filter(|e| e.state_timer > 0) {
                if entry.state_timer <= ticks {
                    entry.state_timer = 0;
                    expired.push((id, entry.address));
                } else {
                    entry.state_timer -= ticks;
                }
            }
        }
        expired
    }
}

impl InterfaceStack for MemoryStack {
    fn hardware_address(&self, interface: InterfaceId) -> Option<HardwareAddr> {
        self.interfaces.get(&interface).map(|i| i.hardware_address)
    }

    fn has_address(&self, interface: InterfaceId, address: &Ipv6Addr) -> bool {
        self.address(interface, address).is_some()
    }

    fn add_address(&mut self, interface: InterfaceId, entry: NewAddress) -> bool {
        if std::mem::take(&mut self.fail_next_add) {
            return false;
        }
        let Some(iface) = self.interfaces.get_mut(&interface) else {
            return false;
        };
        iface.addresses.push(AddressEntry {
            address: entry.address,
            prefix_len: entry.prefix_len,
            source: entry.source,
            valid_lifetime: entry.valid_lifetime,
            preferred_lifetime: entry.preferred_lifetime,
            deprecated: false,
            state_timer: 0,
        });
        true
    }

    fn set_valid_lifetime(&mut self, interface: InterfaceId, address: &Ipv6Addr, lifetime: u32) {
        if let Some(entry) = self.entry_mut(interface, address) {
            entry.valid_lifetime = lifetime;
        }
    }

    fn set_preferred_lifetime(&mut self, interface: InterfaceId, address: &Ipv6Addr, lifetime: u32) {
        if let Some(entry) = self.entry_mut(interface, address) {
            entry.preferred_lifetime = lifetime;
            entry.deprecated = lifetime == 0;
        }
    }

    fn deprecate_address(&mut self, interface: InterfaceId, address: &Ipv6Addr) {
        if let Some(entry) = self.entry_mut(interface, address) {
            entry.deprecated = true;
            entry.preferred_lifetime = 0;
        }
    }

    fn delete_address(&mut self, interface: InterfaceId, address: &Ipv6Addr) {
        if let Some(iface) = self.interfaces.get_mut(&interface) {
            iface.addresses.retain(|e| e.address != *address);
        }
    }

    fn set_state_timer(&mut self, interface: InterfaceId, address: &Ipv6Addr, ticks: u32) {
        if ticks == 0 {
            return;
        }
        if let Some(entry) = self.entry_mut(interface, address) {
            entry.state_timer = ticks;
        }
    }
}
