//! Renewal trigger
//!
//! Address timer expiries land here. A timer on a DHCP address sends a
//! RENEW (or a fresh SOLICIT when the client is configured that way);
//! invalidation drops the binding.

use super::request::{allocate_message, build_request, OutgoingRequest};
use super::service::Dhcp6ClientService;
use super::stack::{DhcpTransport, InterfaceStack};
use crate::protocol::dhcpv6::{
    renew_message_len, solicit_message_len, vendor_class_option_len, Dhcp6MessageType, IaAddress,
};
use crate::protocol::InterfaceId;
use std::net::Ipv6Addr;
use tracing::{debug, error, info, warn};

/// Ticks before a failed renewal is tried again (20 s)
pub const RETRY_TICKS: u32 = 200;

/// Why the address subsystem called back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressEventReason {
    /// State timer ran out
    Timer,
    /// Address lifetime expired; the address is gone
    Invalidated,
    Other,
}

/// What an address event led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// Request handed to the transport
    Sent(Dhcp6MessageType),
    /// A transaction was already outstanding
    InProgress,
    /// Session released after invalidation
    Released,
    /// No client, no session, or a reason that needs no action
    Ignored,
    /// Request not sent; the address timer was re-armed
    RetryScheduled,
    /// Request not sent and no timer to re-arm
    Failed,
}

impl<T: DhcpTransport, S: InterfaceStack> Dhcp6ClientService<T, S> {
    /// Address timer callback.
    ///
    /// `address` is the interface address whose timer fired; without one the
    /// client instance's session is used.
    pub fn on_address_event(
        &mut self,
        interface: InterfaceId,
        address: Option<Ipv6Addr>,
        reason: AddressEventReason,
    ) -> RenewalOutcome {
        let Some(client) = self.clients.get(interface) else {
            return RenewalOutcome::Ignored;
        };
        let handle = match address {
            Some(address) => self.sessions.find_by_prefix(interface, &address),
            None => self.sessions.find_by_instance(client.instance),
        };
        let Some(handle) = handle else {
            return RenewalOutcome::Ignored;
        };

        match reason {
            AddressEventReason::Invalidated => {
                self.transport.cancel_all(handle);
                self.sessions.free(handle);
                warn!(interface, session = %handle, "DHCP address lost");
                return RenewalOutcome::Released;
            }
            AddressEventReason::Other => return RenewalOutcome::Ignored,
            AddressEventReason::Timer => {}
        }

        let Some(session) = self.sessions.get(handle) else {
            return RenewalOutcome::Ignored;
        };
        if session.transaction.is_some() {
            warn!(interface, session = %handle, "renew already pending");
            return RenewalOutcome::InProgress;
        }

        let use_solicit = client.renew_uses_solicit;
        let skip_address = client.omit_address_hint;
        let retry = client.retry;
        let channel = client.channel;
        let relay_channel = client.relay_channel;

        let class = self.config.variant.vendor_class();
        let client_len = session.client_duid.encoded_len();
        let len = if use_solicit {
            solicit_message_len(client_len, !skip_address)
        } else {
            renew_message_len(client_len, session.server_duid.encoded_len(), !skip_address)
        } + vendor_class_option_len(class);

        let buffer = match allocate_message(len) {
            Ok(buffer) => buffer,
            Err(e) => {
                error!(interface, "{}", e);
                return self.schedule_retry(interface, address);
            }
        };

        let msg_type = if use_solicit {
            Dhcp6MessageType::Solicit
        } else {
            Dhcp6MessageType::Renew
        };
        let (t1, t2) = if skip_address {
            (0, 0)
        } else {
            (session.t1, session.t2)
        };
        let message = build_request(
            buffer,
            &OutgoingRequest {
                msg_type,
                client_duid: session.client_duid.as_view(),
                // a SOLICIT never names a server
                server_duid: if use_solicit {
                    None
                } else {
                    session.server_duid.get()
                },
                iaid: session.iaid,
                t1,
                t2,
                hint: (!skip_address).then(|| IaAddress {
                    address: session.address,
                    preferred_lifetime: session.preferred_lifetime,
                    valid_lifetime: session.valid_lifetime,
                }),
            },
            self.config.enterprise_number,
            class,
        );

        let destination = relay_channel
            .and_then(|ch| self.transport.relay_global_address(ch))
            .unwrap_or(session.server_address);

        let transaction = channel.and_then(|ch| self.transport.send(ch, handle, destination, message));
        let Some(transaction) = transaction else {
            self.stats.send_failures.inc();
            error!(interface, %destination, "DHCP renew send failed");
            return self.schedule_retry(interface, address);
        };

        if let Some(session) = self.sessions.get_mut(handle) {
            session.transaction = Some(transaction);
        }
        if use_solicit && retry.is_configured() {
            self.transport.set_retry_timing(transaction, retry);
        }
        match msg_type {
            Dhcp6MessageType::Solicit => self.stats.solicits_sent.inc(),
            _ => self.stats.renews_sent.inc(),
        }
        info!(interface, %destination, %transaction, ?msg_type, "DHCP renew sent");
        RenewalOutcome::Sent(msg_type)
    }

    fn schedule_retry(&mut self, interface: InterfaceId, address: Option<Ipv6Addr>) -> RenewalOutcome {
        match address {
            Some(address) => {
                self.stack.set_state_timer(interface, &address, RETRY_TICKS);
                debug!(interface, %address, ticks = RETRY_TICKS, "renewal retry scheduled");
                RenewalOutcome::RetryScheduled
            }
            None => RenewalOutcome::Failed,
        }
    }
}
