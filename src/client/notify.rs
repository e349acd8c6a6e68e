//! Vendor option notifier
//!
//! Picks vendor-specific, vendor-class, DNS server and domain list options
//! out of an accepted REPLY and hands them to the client's notify callback.
//! Anything else, or any record with a bad inner length, is skipped.

use super::service::Dhcp6ClientService;
use super::session::SessionHandle;
use super::stack::{DhcpTransport, InterfaceStack};
use crate::protocol::dhcpv6::{options, Dhcp6Option, OptionIter};
use crate::protocol::InterfaceId;
use std::net::Ipv6Addr;
use tracing::trace;

/// Option forwarded to the notify callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionNotification<'a> {
    VendorSpecific { enterprise_number: u32, data: &'a [u8] },
    VendorClass { enterprise_number: u32, data: &'a [u8] },
    /// Whole number of IPv6 addresses
    DnsServers(&'a [u8]),
    /// Opaque RFC 1035 encoded domain list
    DomainList(&'a [u8]),
}

impl<'a> OptionNotification<'a> {
    /// Accept an option record if it is one of the forwarded kinds
    pub fn from_option(option: Dhcp6Option<'a>) -> Option<Self> {
        match option.code {
            options::VENDOR_OPTS | options::VENDOR_CLASS => {
                if option.data.len() < 4 {
                    return None;
                }
                let (enterprise, data) = option.data.split_at(4);
                let enterprise_number =
                    u32::from_be_bytes([enterprise[0], enterprise[1], enterprise[2], enterprise[3]]);
                Some(if option.code == options::VENDOR_OPTS {
                    OptionNotification::VendorSpecific {
                        enterprise_number,
                        data,
                    }
                } else {
                    OptionNotification::VendorClass {
                        enterprise_number,
                        data,
                    }
                })
            }
            options::DNS_SERVERS => {
                let len = option.data.len();
                (len >= 16 && len % 16 == 0).then_some(OptionNotification::DnsServers(option.data))
            }
            options::DOMAIN_LIST => Some(OptionNotification::DomainList(option.data)),
            _ => None,
        }
    }

    /// DHCPv6 option code
    pub fn option_type(&self) -> u16 {
        match self {
            OptionNotification::VendorSpecific { .. } => options::VENDOR_OPTS,
            OptionNotification::VendorClass { .. } => options::VENDOR_CLASS,
            OptionNotification::DnsServers(_) => options::DNS_SERVERS,
            OptionNotification::DomainList(_) => options::DOMAIN_LIST,
        }
    }

    /// Addresses of a DNS server list; empty for other kinds
    pub fn dns_servers(&self) -> Vec<Ipv6Addr> {
        match self {
            OptionNotification::DnsServers(data) => data
                .chunks_exact(16)
                .map(|chunk| {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(chunk);
                    Ipv6Addr::from(octets)
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Server details passed along with each notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInfo<'a> {
    /// Server DUID body, without its 2-byte type
    pub duid: &'a [u8],
    pub duid_type: u16,
    /// Valid lifetime of the binding, seconds
    pub lifetime: u32,
}

/// Forwardable options of a REPLY option stream, in wire order
pub fn option_notifications(opts: &[u8]) -> impl Iterator<Item = OptionNotification<'_>> {
    OptionIter::new(opts).filter_map(OptionNotification::from_option)
}

impl<T: DhcpTransport, S: InterfaceStack> Dhcp6ClientService<T, S> {
    /// Run the notify callback over the options of an applied REPLY
    pub(super) fn notify_options(&mut self, interface: InterfaceId, handle: SessionHandle, opts: &[u8]) {
        let Some(callback) = self
            .clients
            .get_mut(interface)
            .and_then(|c| c.option_notify_callback.as_mut())
        else {
            return;
        };
        let Some(session) = self.sessions.get(handle) else {
            return;
        };
        if session.valid_lifetime == 0 {
            return;
        }
        let Some(server) = session.server_duid.get() else {
            return;
        };

        let info = ServerInfo {
            duid: server.data,
            duid_type: server.duid_type,
            lifetime: session.valid_lifetime,
        };

        for notification in option_notifications(opts) {
            trace!(interface, option = notification.option_type(), "option notify");
            callback(interface, &notification, &info);
            self.stats.option_notifications.inc();
        }
    }
}
