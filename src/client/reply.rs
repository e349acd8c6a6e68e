//! Reply validator and state applier
//!
//! A REPLY is checked in full before anything is written to the session.
//! Every rejection ends in the same place: the transaction slot is already
//! free, the completion callback hears `false`, and the error goes back to
//! the transport.

use super::service::Dhcp6ClientService;
use super::session::SessionHandle;
use super::stack::{DhcpTransport, InterfaceStack};
use crate::error::ProtocolViolation;
use crate::protocol::dhcpv6::{parse_reply_options, Dhcp6MessageType};
use crate::{Error, Result};
use tracing::{debug, info, warn};

impl<T: DhcpTransport, S: InterfaceStack> Dhcp6ClientService<T, S> {
    /// Deliver a response for the request sent on behalf of `handle`.
    ///
    /// `opts` is the option stream following the 4-byte message header.
    pub fn on_reply(&mut self, handle: SessionHandle, message_type: u8, opts: &[u8]) -> Result<()> {
        match self.apply_reply(handle, message_type, opts) {
            Ok(()) => {
                self.stats.replies_accepted.inc();
                Ok(())
            }
            Err(e) => {
                warn!(session = %handle, "REPLY rejected: {}", e);
                self.stats.replies_rejected.inc();
                self.report_failure(handle);
                Err(e)
            }
        }
    }

    fn report_failure(&mut self, handle: SessionHandle) {
        let Some(session) = self.sessions.get(handle) else {
            return;
        };
        let Some(callback) = self
            .clients
            .get_mut(session.interface)
            .and_then(|c| c.global_address_callback.as_mut())
        else {
            return;
        };
        callback(session.interface, session.server_address, session.address, false);
    }

    fn apply_reply(&mut self, handle: SessionHandle, message_type: u8, opts: &[u8]) -> Result<()> {
        let Some(session) = self.sessions.get_mut(handle) else {
            return Err(Error::NotFound(format!("stale session handle {}", handle)));
        };
        let interface = session.interface;
        let single = match self.clients.get(interface) {
            Some(client) => client.one_binding_per_interface,
            None => {
                return Err(Error::NotFound(format!(
                    "no DHCPv6 client on interface {}",
                    interface
                )))
            }
        };

        session.transaction = None;

        if message_type != Dhcp6MessageType::Reply as u8 {
            return Err(ProtocolViolation::UnexpectedMessageType(message_type).into());
        }

        let reply = parse_reply_options(opts)?;
        let granted = &reply.granted;

        if self.sessions.find_by_iaid(granted.iaid) != Some(handle) {
            return Err(ProtocolViolation::SessionMismatch(granted.iaid).into());
        }
        let Some(session) = self.sessions.get_mut(handle) else {
            return Err(Error::NotFound(format!("stale session handle {}", handle)));
        };
        // implied by the IAID lookup above; never fires while that holds
        if session.iaid != granted.iaid {
            return Err(ProtocolViolation::IaidMismatch {
                expected: session.iaid,
                got: granted.iaid,
            }
            .into());
        }
        if session.client_duid.as_view() != reply.client_id {
            return Err(ProtocolViolation::ClientDuidMismatch.into());
        }

        session.server_duid.store(reply.server_id)?;

        if single
            && session.address != granted.address
            && self.stack.has_address(interface, &session.address)
        {
            debug!(interface, old = %session.address, "deprecating superseded address");
            self.stack.deprecate_address(interface, &session.address);
        }

        session.address = granted.address;
        session.preferred_lifetime = granted.preferred_lifetime;
        session.valid_lifetime = granted.valid_lifetime;
        session.t1 = granted.t1;
        session.t2 = granted.t2;
        let server_address = session.server_address;

        let installed = self.install_address(handle);
        info!(
            interface,
            address = %granted.address,
            preferred = granted.preferred_lifetime,
            valid = granted.valid_lifetime,
            installed,
            "DHCPv6 address bound"
        );

        if let Some(callback) = self
            .clients
            .get_mut(interface)
            .and_then(|c| c.global_address_callback.as_mut())
        {
            callback(interface, server_address, granted.address, installed);
        }

        self.notify_options(interface, handle, opts);
        Ok(())
    }
}
