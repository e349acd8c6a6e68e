//! Collaborator interfaces
//!
//! The client never touches sockets or the address table itself. It drives
//! a DHCP transport service and the interface/address subsystem through the
//! traits below; both deliver events back through
//! [`Dhcp6ClientService::on_reply`](super::Dhcp6ClientService::on_reply) and
//! [`Dhcp6ClientService::on_address_event`](super::Dhcp6ClientService::on_address_event).

use super::session::SessionHandle;
use crate::config::BuildVariant;
use crate::protocol::{HardwareAddr, InterfaceId};
use std::fmt;
use std::net::Ipv6Addr;

/// Send channel allocated by the transport service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u16);

/// Role of a transport channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Client,
    RelayAgent,
}

/// Transaction the transport is tracking; never zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u32);

impl TransactionId {
    pub fn new(value: u32) -> Option<Self> {
        (value != 0).then_some(TransactionId(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

/// SOLICIT retransmission override (all zero = protocol defaults)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryTiming {
    /// Initial retransmission timeout, seconds
    pub timeout: u16,
    /// Maximum retransmission timeout, seconds
    pub max_rt: u16,
    /// Maximum retransmission count
    pub max_rc: u8,
}

impl RetryTiming {
    pub fn is_configured(&self) -> bool {
        self.timeout != 0
    }
}

/// DHCP transport service: channels, sends and retransmissions.
pub trait DhcpTransport {
    /// Allocate a channel for the interface; `None` if none is available.
    fn open_channel(&mut self, interface: InterfaceId, role: ChannelRole) -> Option<ChannelId>;

    fn close_channel(&mut self, channel: ChannelId);

    /// Queue `message` to `destination`. Ownership of the buffer moves to
    /// the transport. `None` means the request could not be queued.
    fn send(
        &mut self,
        channel: ChannelId,
        session: SessionHandle,
        destination: Ipv6Addr,
        message: Vec<u8>,
    ) -> Option<TransactionId>;

    fn set_retry_timing(&mut self, transaction: TransactionId, timing: RetryTiming);

    /// Redirect retransmissions of an outstanding transaction.
    fn update_server_address(&mut self, transaction: TransactionId, server: Ipv6Addr);

    /// Drop every pending transmission that belongs to `session`.
    fn cancel_all(&mut self, session: SessionHandle);

    fn enable_relay(&mut self, channel: ChannelId, server: Ipv6Addr);

    fn set_relay_interface_id_option(&mut self, channel: ChannelId, enabled: bool);

    /// Global address advertised through the relay channel, if any.
    fn relay_global_address(&self, channel: ChannelId) -> Option<Ipv6Addr>;
}

/// Where an interface address came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    Static,
    Slaac,
    Dhcp,
}

/// Parameters for installing an interface address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddress {
    pub address: Ipv6Addr,
    pub prefix_len: u8,
    pub source: AddressSource,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
}

/// Interface registry and address table.
///
/// Address timers count 100 ms ticks. When a timer armed through
/// [`set_state_timer`](InterfaceStack::set_state_timer) runs out, the
/// scheduler reports it with `AddressEventReason::Timer`.
pub trait InterfaceStack {
    /// Hardware address of a live interface; `None` if it does not exist.
    fn hardware_address(&self, interface: InterfaceId) -> Option<HardwareAddr>;

    fn interface_exists(&self, interface: InterfaceId) -> bool {
        self.hardware_address(interface).is_some()
    }

    fn has_address(&self, interface: InterfaceId, address: &Ipv6Addr) -> bool;

    fn add_address(&mut self, interface: InterfaceId, entry: NewAddress) -> bool;

    fn set_valid_lifetime(&mut self, interface: InterfaceId, address: &Ipv6Addr, lifetime: u32);

    fn set_preferred_lifetime(&mut self, interface: InterfaceId, address: &Ipv6Addr, lifetime: u32);

    /// Mark an address deprecated; it stays usable for existing traffic.
    fn deprecate_address(&mut self, interface: InterfaceId, address: &Ipv6Addr);

    fn delete_address(&mut self, interface: InterfaceId, address: &Ipv6Addr);

    /// Arm the address state timer. Zero leaves the interface default.
    fn set_state_timer(&mut self, interface: InterfaceId, address: &Ipv6Addr, ticks: u32);
}

/// Capability notified whenever a DHCP address has been installed.
pub trait BindingObserver {
    fn address_bound(&mut self, interface: InterfaceId, address: Ipv6Addr, variant: BuildVariant);
}
