//! Address lifecycle integration
//!
//! Installs a granted binding on the interface and arms the renewal timer.

use super::service::Dhcp6ClientService;
use super::session::SessionHandle;
use super::stack::{AddressSource, DhcpTransport, InterfaceStack, NewAddress};
use crate::protocol::dhcpv6::INFINITE_LIFETIME;
use tracing::{debug, warn};

/// Prefix length of every DHCP-assigned address
pub const DHCP_PREFIX_LEN: u8 = 64;

/// Address timer ticks per second (100 ms ticks)
pub const TICKS_PER_SECOND: u32 = 10;

/// Largest tick count a renewal timer is set to
pub const MAX_TIMER_TICKS: u32 = 0xFFFF_FFFE;

/// Seconds until the binding should be renewed; 0 means no renewal.
///
/// T1 wins when the server set it. Otherwise renew at half of the shorter
/// lifetime.
pub fn renewal_seconds(t1: u32, preferred_lifetime: u32, valid_lifetime: u32) -> u32 {
    if t1 != 0 {
        return if t1 == INFINITE_LIFETIME { 0 } else { t1 };
    }

    match preferred_lifetime.min(valid_lifetime) {
        0 | INFINITE_LIFETIME => 0,
        lifetime => lifetime / 2,
    }
}

/// Convert seconds to address timer ticks, saturating
pub fn seconds_to_ticks(seconds: u32) -> u32 {
    if seconds < u32::MAX / TICKS_PER_SECOND {
        seconds * TICKS_PER_SECOND
    } else {
        MAX_TIMER_TICKS
    }
}

impl<T: DhcpTransport, S: InterfaceStack> Dhcp6ClientService<T, S> {
    /// Add or refresh the session's address on its interface.
    ///
    /// Marks the session valid on success and invalid if the address table
    /// refused the entry.
    pub(super) fn install_address(&mut self, handle: SessionHandle) -> bool {
        let Some(session) = self.sessions.get_mut(handle) else {
            return false;
        };
        let interface = session.interface;
        if !self.stack.interface_exists(interface) {
            return false;
        }

        let address = session.address;
        let renew = renewal_seconds(session.t1, session.preferred_lifetime, session.valid_lifetime);
        session.valid = true;

        let installed = if self.stack.has_address(interface, &address) {
            self.stack
                .set_valid_lifetime(interface, &address, session.valid_lifetime);
            self.stack
                .set_preferred_lifetime(interface, &address, session.preferred_lifetime);
            true
        } else {
            self.stack.add_address(
                interface,
                NewAddress {
                    address,
                    prefix_len: DHCP_PREFIX_LEN,
                    source: AddressSource::Dhcp,
                    valid_lifetime: session.valid_lifetime,
                    preferred_lifetime: session.preferred_lifetime,
                },
            )
        };

        if !installed {
            warn!(interface, %address, "address add failed");
            session.valid = false;
            return false;
        }

        let ticks = seconds_to_ticks(renew);
        self.stack.set_state_timer(interface, &address, ticks);
        debug!(interface, %address, renew_secs = renew, ticks, "address installed");

        if let Some(observer) = self.observer.as_mut() {
            observer.address_bound(interface, address, self.config.variant);
        }
        true
    }
}
