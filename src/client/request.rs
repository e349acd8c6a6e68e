//! Request builder
//!
//! SOLICIT path plus the operations that redirect or drop a single binding.

use super::registry::GlobalAddressCallback;
use super::service::Dhcp6ClientService;
use super::session::SessionHandle;
use super::stack::{DhcpTransport, InterfaceStack};
use crate::protocol::dhcpv6::{
    generate_transaction_id, solicit_message_len, vendor_class_option_len, Dhcp6Builder,
    Dhcp6MessageType, DuidRef, IaAddress, IaNa,
};
use crate::protocol::{same_prefix64, InterfaceId};
use crate::{Error, Result};
use std::net::Ipv6Addr;
use tracing::{debug, error, info, trace};

/// Fields of an outgoing SOLICIT or RENEW
#[derive(Debug, Clone)]
pub(super) struct OutgoingRequest<'a> {
    pub msg_type: Dhcp6MessageType,
    pub client_duid: DuidRef<'a>,
    pub server_duid: Option<DuidRef<'a>>,
    pub iaid: u32,
    pub t1: u32,
    pub t2: u32,
    pub hint: Option<IaAddress>,
}

/// Reserve an outgoing message buffer of exactly `len` bytes
pub(super) fn allocate_message(len: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory(format!("{} byte message buffer", len)))?;
    Ok(buffer)
}

/// Write a request into `buffer`, closing with the Vendor Class option
pub(super) fn build_request(
    buffer: Vec<u8>,
    request: &OutgoingRequest<'_>,
    enterprise_number: u32,
    vendor_class: &str,
) -> Vec<u8> {
    let mut builder = Dhcp6Builder::with_buffer(request.msg_type, buffer)
        .transaction_id(generate_transaction_id())
        .client_id(request.client_duid);
    if let Some(server) = request.server_duid {
        builder = builder.server_id(server);
    }
    builder
        .elapsed_time(0)
        .ia_na_with_addresses(&IaNa {
            iaid: request.iaid,
            t1: request.t1,
            t2: request.t2,
            addresses: request.hint.iter().cloned().collect(),
            status: None,
        })
        .vendor_class(enterprise_number, vendor_class)
        .build()
}

impl<T: DhcpTransport, S: InterfaceStack> Dhcp6ClientService<T, S> {
    /// Ask the server at `server` for a global address.
    ///
    /// With a `prefix` the address is requested inside that /64; the client
    /// keeps one session per prefix unless it is limited to one binding.
    /// `callback` replaces the client's completion callback and fires when
    /// the REPLY is applied or rejected.
    pub fn request_global_address(
        &mut self,
        interface: InterfaceId,
        server: Ipv6Addr,
        prefix: Option<Ipv6Addr>,
        callback: Option<GlobalAddressCallback>,
    ) -> Result<()> {
        if server.is_unspecified() {
            return Err(Error::InvalidParameter("server address is unset".into()));
        }
        let client = self
            .clients
            .get(interface)
            .ok_or_else(|| Error::NotFound(format!("no DHCPv6 client on interface {}", interface)))?;
        let channel = client
            .channel
            .ok_or_else(|| Error::NotFound(format!("interface {} has no transport channel", interface)))?;
        let instance = client.instance;
        let single = client.one_binding_per_interface;
        let omit_hint = client.omit_address_hint;
        let retry = client.retry;
        let duid = client.duid.clone();

        let handle = if prefix.is_none() || single {
            match self.sessions.find_by_instance(instance) {
                Some(handle) => {
                    let Some(prefix) = prefix.filter(|_| single) else {
                        return Err(Error::AlreadyInProgress(format!(
                            "interface {} already has a DHCPv6 session",
                            interface
                        )));
                    };
                    let Some(session) = self.sessions.get_mut(handle) else {
                        return Err(Error::NotFound(format!("session {}", handle)));
                    };
                    if !session.valid {
                        return self.server_address_update(interface, Some(prefix), server);
                    }
                    if same_prefix64(&session.address, &prefix) {
                        trace!(interface, %prefix, "address already bound");
                        return Ok(());
                    }

                    // Move the single binding to the new prefix
                    self.transport.cancel_all(handle);
                    self.stack.deprecate_address(interface, &session.address);
                    info!(interface, old = %session.address, new = %prefix, "re-homing DHCPv6 binding");
                    session.valid = false;
                    session.transaction = None;
                    session.address = prefix;
                    session.server_address = server;
                    handle
                }
                None => self.sessions.allocate(interface, instance, duid, prefix, server)?,
            }
        } else {
            match self.server_address_update(interface, prefix, server) {
                Ok(()) => return Ok(()),
                Err(Error::NotFound(_)) => {
                    self.sessions.allocate(interface, instance, duid, prefix, server)?
                }
                Err(e) => return Err(e),
            }
        };

        debug!(interface, instance, session = %handle, "new DHCPv6 request");

        let hint = prefix.filter(|_| !omit_hint);
        let class = self.config.variant.vendor_class();
        let Some(session) = self.sessions.get(handle) else {
            return Err(Error::NotFound(format!("session {}", handle)));
        };
        let len = solicit_message_len(session.client_duid.encoded_len(), hint.is_some())
            + vendor_class_option_len(class);

        let buffer = match allocate_message(len) {
            Ok(buffer) => buffer,
            Err(e) => {
                error!(interface, "{}", e);
                self.sessions.free(handle);
                return Err(e);
            }
        };

        if let Some(client) = self.clients.get_mut(interface) {
            client.global_address_callback = callback;
        }

        let message = build_request(
            buffer,
            &OutgoingRequest {
                msg_type: Dhcp6MessageType::Solicit,
                client_duid: session.client_duid.as_view(),
                server_duid: None,
                iaid: session.iaid,
                t1: 0,
                t2: 0,
                hint: hint.map(|address| IaAddress {
                    address,
                    preferred_lifetime: 0,
                    valid_lifetime: 0,
                }),
            },
            self.config.enterprise_number,
            class,
        );

        let Some(transaction) = self.transport.send(channel, handle, server, message) else {
            self.stats.send_failures.inc();
            self.sessions.free(handle);
            return Err(Error::SendFailure(format!(
                "SOLICIT to {} on interface {}",
                server, interface
            )));
        };

        if let Some(session) = self.sessions.get_mut(handle) {
            session.transaction = Some(transaction);
            session.valid = false;
        }
        if retry.is_configured() {
            self.transport.set_retry_timing(transaction, retry);
        }
        self.stats.solicits_sent.inc();
        debug!(interface, %server, %transaction, "SOLICIT sent");
        Ok(())
    }

    /// Point a binding at a new server (or relay) address.
    ///
    /// The session is found by `prefix`, or by the client instance when the
    /// interface is limited to one binding. An outstanding transaction is
    /// redirected as well.
    pub fn server_address_update(
        &mut self,
        interface: InterfaceId,
        prefix: Option<Ipv6Addr>,
        server: Ipv6Addr,
    ) -> Result<()> {
        let client = self
            .clients
            .get(interface)
            .ok_or_else(|| Error::NotFound(format!("no DHCPv6 client on interface {}", interface)))?;

        let handle = match prefix {
            Some(prefix) => self.sessions.find_by_prefix(interface, &prefix),
            None if client.one_binding_per_interface => self.sessions.find_by_instance(client.instance),
            None => None,
        }
        .ok_or_else(|| Error::NotFound(format!("no DHCPv6 session on interface {}", interface)))?;

        let Some(session) = self.sessions.get_mut(handle) else {
            return Err(Error::NotFound(format!("session {}", handle)));
        };
        if session.server_address == server {
            return Ok(());
        }

        session.server_address = server;
        if let Some(transaction) = session.transaction {
            self.transport.update_server_address(transaction, server);
        }
        debug!(interface, %server, "DHCPv6 server address updated");
        Ok(())
    }

    /// Renewal is driven by the address timer; nothing to do here.
    pub fn global_address_renew(&mut self, interface: InterfaceId) {
        trace!(interface, "global address renew requested");
    }

    /// Drop the binding for `prefix`.
    ///
    /// Pending retransmissions are cancelled. The address is deprecated when
    /// the interface is limited to one binding and deleted otherwise.
    pub fn global_address_delete(&mut self, interface: InterfaceId, prefix: Ipv6Addr) -> Result<()> {
        let single = self
            .clients
            .get(interface)
            .map(|c| c.one_binding_per_interface)
            .ok_or_else(|| Error::NotFound(format!("no DHCPv6 client on interface {}", interface)))?;
        if !self.stack.interface_exists(interface) {
            return Err(Error::NotFound(format!("interface {}", interface)));
        }
        let handle = self
            .sessions
            .find_by_prefix(interface, &prefix)
            .ok_or_else(|| Error::NotFound(format!("no DHCPv6 session for {}", prefix)))?;

        self.release_session(handle, single);
        Ok(())
    }

    /// Cancel, then deprecate or delete the address, then free the session
    pub(super) fn release_session(&mut self, handle: SessionHandle, deprecate: bool) {
        self.transport.cancel_all(handle);
        let Some(session) = self.sessions.free(handle) else {
            return;
        };
        if deprecate {
            self.stack.deprecate_address(session.interface, &session.address);
        } else {
            self.stack.delete_address(session.interface, &session.address);
        }
        info!(interface = session.interface, address = %session.address, "DHCPv6 binding released");
    }
}
