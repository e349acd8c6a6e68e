//! Client registry
//!
//! One [`ClientConfig`] per interface: its DUID, transport channels, retry
//! override, behaviour flags and the caller's callbacks.

use super::notify::{OptionNotification, ServerInfo};
use super::service::Dhcp6ClientService;
use super::session::ClientInstanceId;
use super::stack::{ChannelId, ChannelRole, DhcpTransport, InterfaceStack, RetryTiming};
use crate::protocol::dhcpv6::Duid;
use crate::protocol::{InterfaceId, LinkType};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv6Addr;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Called with `(interface, server address, address, success)` when a
/// SOLICIT/RENEW exchange completes or fails.
pub type GlobalAddressCallback = Box<dyn FnMut(InterfaceId, Ipv6Addr, Ipv6Addr, bool)>;

/// Called once per accepted vendor/DNS/domain option of a REPLY.
pub type OptionNotifyCallback =
    Box<dyn FnMut(InterfaceId, &OptionNotification<'_>, &ServerInfo<'_>)>;

/// Per-interface client configuration
pub struct ClientConfig {
    pub(super) interface: InterfaceId,
    pub(super) duid: Rc<Duid>,
    pub(super) channel: Option<ChannelId>,
    pub(super) relay_channel: Option<ChannelId>,
    pub(super) instance: ClientInstanceId,
    pub(super) retry: RetryTiming,
    pub(super) renew_uses_solicit: bool,
    pub(super) one_binding_per_interface: bool,
    pub(super) omit_address_hint: bool,
    pub(super) global_address_callback: Option<GlobalAddressCallback>,
    pub(super) option_notify_callback: Option<OptionNotifyCallback>,
}

impl ClientConfig {
    fn new(interface: InterfaceId, duid: Duid, instance: ClientInstanceId) -> Self {
        Self {
            interface,
            duid: Rc::new(duid),
            channel: None,
            relay_channel: None,
            instance,
            retry: RetryTiming::default(),
            renew_uses_solicit: false,
            one_binding_per_interface: false,
            omit_address_hint: false,
            global_address_callback: None,
            option_notify_callback: None,
        }
    }

    /// Back to default flags and timing; DUID and callbacks are kept
    fn reset(&mut self, instance: ClientInstanceId) {
        self.retry = RetryTiming::default();
        self.renew_uses_solicit = false;
        self.one_binding_per_interface = false;
        self.omit_address_hint = false;
        self.instance = instance;
    }

    pub fn interface(&self) -> InterfaceId {
        self.interface
    }

    pub fn duid(&self) -> &Duid {
        &self.duid
    }

    /// Client transport channel; `None` after [`delete`](Dhcp6ClientService::delete)
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    pub fn relay_channel(&self) -> Option<ChannelId> {
        self.relay_channel
    }

    pub fn instance(&self) -> ClientInstanceId {
        self.instance
    }

    pub fn retry_timing(&self) -> RetryTiming {
        self.retry
    }

    pub fn renew_uses_solicit(&self) -> bool {
        self.renew_uses_solicit
    }

    pub fn one_binding_per_interface(&self) -> bool {
        self.one_binding_per_interface
    }

    pub fn omit_address_hint(&self) -> bool {
        self.omit_address_hint
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("interface", &self.interface)
            .field("duid", &self.duid)
            .field("channel", &self.channel)
            .field("relay_channel", &self.relay_channel)
            .field("instance", &self.instance)
            .field("retry", &self.retry)
            .field("renew_uses_solicit", &self.renew_uses_solicit)
            .field("one_binding_per_interface", &self.one_binding_per_interface)
            .field("omit_address_hint", &self.omit_address_hint)
            .field("global_address_callback", &self.global_address_callback.is_some())
            .field("option_notify_callback", &self.option_notify_callback.is_some())
            .finish()
    }
}

/// Client configurations keyed by interface
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<InterfaceId, ClientConfig>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, interface: InterfaceId) -> Option<&ClientConfig> {
        self.clients.get(&interface)
    }

    pub(super) fn get_mut(&mut self, interface: InterfaceId) -> Option<&mut ClientConfig> {
        self.clients.get_mut(&interface)
    }

    pub fn contains(&self, interface: InterfaceId) -> bool {
        self.clients.contains_key(&interface)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientConfig> {
        self.clients.values()
    }

    fn insert(&mut self, client: ClientConfig) -> Result<()> {
        self.clients
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory("client registry entry".into()))?;
        self.clients.insert(client.interface, client);
        Ok(())
    }
}

impl<T: DhcpTransport, S: InterfaceStack> Dhcp6ClientService<T, S> {
    /// Instance id unused by any client and any session
    fn unique_instance_id(&mut self) -> ClientInstanceId {
        loop {
            let id = self.sessions.unique_instance_id();
            if !self.clients.iter().any(|c| c.instance == id) {
                return id;
            }
        }
    }

    /// Register a client on `interface`, or reset the one already there.
    ///
    /// A missing interface is not an error; nothing happens. Re-initialising
    /// keeps existing sessions but gives the client a fresh instance id.
    pub fn initialize(&mut self, interface: InterfaceId, link_type: LinkType) -> Result<()> {
        let Some(hw) = self.stack.hardware_address(interface) else {
            debug!(interface, "initialize: interface does not exist");
            return Ok(());
        };

        let instance = self.unique_instance_id();

        if let Some(client) = self.clients.get_mut(interface) {
            client.reset(instance);
            if client.channel.is_none() {
                client.channel = self.transport.open_channel(interface, ChannelRole::Client);
            }
            debug!(interface, instance, "client re-initialized");
            return Ok(());
        }

        let duid = Duid::link_layer(link_type, &hw);
        let mut client = ClientConfig::new(interface, duid, instance);
        client.channel = self.transport.open_channel(interface, ChannelRole::Client);
        if client.channel.is_none() {
            warn!(interface, "no transport channel available");
        }
        self.clients.insert(client)?;

        info!(interface, instance, %hw, ?link_type, "DHCPv6 client initialized");
        Ok(())
    }

    /// Set the behaviour flags of a client; unknown interfaces are ignored
    pub fn configure(
        &mut self,
        interface: InterfaceId,
        renew_uses_solicit: bool,
        one_binding_per_interface: bool,
        omit_address_hint: bool,
    ) {
        let Some(client) = self.clients.get_mut(interface) else {
            debug!(interface, "configure: no client");
            return;
        };
        client.renew_uses_solicit = renew_uses_solicit;
        client.one_binding_per_interface = one_binding_per_interface;
        client.omit_address_hint = omit_address_hint;
    }

    /// Override SOLICIT retransmission parameters (timeout 0 = defaults)
    pub fn set_solicit_timing(&mut self, interface: InterfaceId, timeout: u16, max_rt: u16, max_rc: u8) {
        if let Some(client) = self.clients.get_mut(interface) {
            client.retry = RetryTiming {
                timeout,
                max_rt,
                max_rc,
            };
        }
    }

    pub fn set_option_notify_callback(
        &mut self,
        interface: InterfaceId,
        callback: Option<OptionNotifyCallback>,
    ) -> Result<()> {
        let client = self
            .clients
            .get_mut(interface)
            .ok_or_else(|| Error::NotFound(format!("no DHCPv6 client on interface {}", interface)))?;
        client.option_notify_callback = callback;
        Ok(())
    }

    /// Open a relay-agent channel towards `border_router`
    pub fn enable_relay(&mut self, interface: InterfaceId, border_router: Ipv6Addr) {
        let Some(client) = self.clients.get_mut(interface) else {
            return;
        };

        let channel = match client.relay_channel {
            Some(channel) => channel,
            None => match self.transport.open_channel(interface, ChannelRole::RelayAgent) {
                Some(channel) => channel,
                None => {
                    warn!(interface, "no relay channel available");
                    return;
                }
            },
        };
        client.relay_channel = Some(channel);
        self.transport.enable_relay(channel, border_router);
        debug!(interface, %border_router, "relay agent enabled");
    }

    pub fn enable_relay_interface_id_option(&mut self, interface: InterfaceId, enabled: bool) {
        let Some(channel) = self.clients.get(interface).and_then(|c| c.relay_channel) else {
            return;
        };
        self.transport.set_relay_interface_id_option(channel, enabled);
    }

    /// Tear down the client of an interface.
    ///
    /// Closes the transport channel, then releases every session of the
    /// interface and deletes the addresses they installed, if the interface
    /// still exists. The client record stays registered without a channel
    /// until the next `initialize`.
    pub fn delete(&mut self, interface: InterfaceId) {
        let Some(client) = self.clients.get_mut(interface) else {
            return;
        };

        if let Some(channel) = client.channel.take() {
            self.transport.close_channel(channel);
        }

        // sessions are released even when the interface is already gone
        let present = self.stack.interface_exists(interface);
        while let Some(handle) = self.sessions.find_by_interface(interface) {
            self.transport.cancel_all(handle);
            if let Some(session) = self.sessions.free(handle) {
                debug!(interface, session = %handle, "free DHCPv6 session");
                if present {
                    self.stack.delete_address(interface, &session.address);
                }
            }
        }

        info!(interface, "DHCPv6 client deleted");
    }
}
