//! Client service
//!
//! [`Dhcp6ClientService`] owns every piece of client state: the per-interface
//! registry, the session arena, the counters and the two collaborators. All
//! entry points take `&mut self`; the surrounding stack drives them from its
//! reply-delivery and address-timer contexts, one at a time.

use super::registry::{ClientConfig, ClientRegistry};
use super::session::{ServerSession, SessionHandle, SessionStore};
use super::stack::{BindingObserver, DhcpTransport, InterfaceStack};
use crate::config::ServiceConfig;
use crate::protocol::InterfaceId;
use crate::telemetry::ClientStats;

/// DHCPv6 client state machine for all interfaces of one stack
pub struct Dhcp6ClientService<T, S> {
    pub(super) config: ServiceConfig,
    pub(super) transport: T,
    pub(super) stack: S,
    pub(super) clients: ClientRegistry,
    pub(super) sessions: SessionStore,
    pub(super) observer: Option<Box<dyn BindingObserver>>,
    pub(super) stats: ClientStats,
}

impl<T: DhcpTransport, S: InterfaceStack> Dhcp6ClientService<T, S> {
    pub fn new(config: ServiceConfig, transport: T, stack: S) -> Self {
        Self {
            config,
            transport,
            stack,
            clients: ClientRegistry::new(),
            sessions: SessionStore::new(),
            observer: None,
            stats: ClientStats::new(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Registered client of an interface
    pub fn client(&self, interface: InterfaceId) -> Option<&ClientConfig> {
        self.clients.get(interface)
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn session(&self, handle: SessionHandle) -> Option<&ServerSession> {
        self.sessions.get(handle)
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Install the component told about every bound address
    pub fn set_binding_observer(&mut self, observer: Box<dyn BindingObserver>) {
        self.observer = Some(observer);
    }
}
