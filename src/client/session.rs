//! Server session store
//!
//! One [`ServerSession`] per address binding, kept in an arena addressed by
//! generation-checked [`SessionHandle`]s. A handle whose slot has been freed
//! (or freed and reused) no longer resolves, so late transport callbacks for
//! a torn-down binding are rejected instead of touching someone else's state.

use super::stack::TransactionId;
use crate::protocol::dhcpv6::{Duid, DuidRef};
use crate::protocol::{same_prefix64, InterfaceId};
use crate::{Error, Result};
use std::fmt;
use std::net::Ipv6Addr;
use std::rc::Rc;

/// Per-client identifier that groups the sessions of one client instance
pub type ClientInstanceId = u16;

/// Handle to a session slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    index: u32,
    generation: u32,
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Server DUID storage that only ever grows
#[derive(Debug, Default)]
pub struct ServerDuidBuffer {
    duid_type: u16,
    storage: Box<[u8]>,
    len: usize,
    stored: bool,
}

impl ServerDuidBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocated size in bytes
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.stored
    }

    /// Grow the storage to hold at least `len` bytes. Never shrinks.
    pub fn ensure_capacity(&mut self, len: usize) -> Result<()> {
        if len <= self.storage.len() {
            return Ok(());
        }

        let mut grown = Vec::new();
        grown
            .try_reserve_exact(len)
            .map_err(|_| Error::OutOfMemory(format!("server DUID buffer of {} bytes", len)))?;
        grown.resize(len, 0);
        self.storage = grown.into_boxed_slice();
        Ok(())
    }

    /// Replace the stored DUID
    pub fn store(&mut self, duid: DuidRef<'_>) -> Result<()> {
        self.ensure_capacity(duid.data.len())?;
        self.storage[..duid.data.len()].copy_from_slice(duid.data);
        self.len = duid.data.len();
        self.duid_type = duid.duid_type;
        self.stored = true;
        Ok(())
    }

    pub fn get(&self) -> Option<DuidRef<'_>> {
        self.stored.then(|| DuidRef {
            duid_type: self.duid_type,
            data: &self.storage[..self.len],
        })
    }

    /// Length on the wire, 0 when nothing is stored
    pub fn encoded_len(&self) -> usize {
        self.get().map_or(0, |d| d.encoded_len())
    }
}

/// State of one address binding with a server
#[derive(Debug)]
pub struct ServerSession {
    pub(crate) interface: InterfaceId,
    pub(crate) instance: ClientInstanceId,
    pub(crate) client_duid: Rc<Duid>,
    pub(crate) server_duid: ServerDuidBuffer,
    pub(crate) iaid: u32,
    pub(crate) address: Ipv6Addr,
    pub(crate) preferred_lifetime: u32,
    pub(crate) valid_lifetime: u32,
    pub(crate) t1: u32,
    pub(crate) t2: u32,
    pub(crate) transaction: Option<TransactionId>,
    pub(crate) server_address: Ipv6Addr,
    pub(crate) valid: bool,
}

impl ServerSession {
    pub fn interface(&self) -> InterfaceId {
        self.interface
    }

    pub fn instance(&self) -> ClientInstanceId {
        self.instance
    }

    pub fn client_duid(&self) -> &Duid {
        &self.client_duid
    }

    pub fn server_duid(&self) -> &ServerDuidBuffer {
        &self.server_duid
    }

    pub fn iaid(&self) -> u32 {
        self.iaid
    }

    /// Bound address, or the requested prefix while unbound
    pub fn address(&self) -> Ipv6Addr {
        self.address
    }

    pub fn preferred_lifetime(&self) -> u32 {
        self.preferred_lifetime
    }

    pub fn valid_lifetime(&self) -> u32 {
        self.valid_lifetime
    }

    /// Renew time (T1) granted by the server, seconds
    pub fn t1(&self) -> u32 {
        self.t1
    }

    /// Rebind time (T2) granted by the server, seconds
    pub fn t2(&self) -> u32 {
        self.t2
    }

    /// Outstanding request, if any
    pub fn transaction(&self) -> Option<TransactionId> {
        self.transaction
    }

    pub fn server_address(&self) -> Ipv6Addr {
        self.server_address
    }

    /// True once a REPLY has been applied and not since invalidated
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    session: Option<ServerSession>,
}

/// Arena of server sessions
#[derive(Debug)]
pub struct SessionStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_iaid: u32,
    next_instance: ClientInstanceId,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            next_iaid: 1,
            next_instance: 1,
        }
    }

    /// Hand out a client instance id no live session is using
    pub fn unique_instance_id(&mut self) -> ClientInstanceId {
        loop {
            let id = self.next_instance;
            self.next_instance = self.next_instance.wrapping_add(1).max(1);
            if self.find_by_instance(id).is_none() {
                return id;
            }
        }
    }

    fn unique_iaid(&mut self) -> u32 {
        loop {
            let iaid = self.next_iaid;
            self.next_iaid = self.next_iaid.wrapping_add(1).max(1);
            if self.find_by_iaid(iaid).is_none() {
                return iaid;
            }
        }
    }

    /// Create a session for a new binding.
    ///
    /// `prefix` becomes the initial recorded address (the hint sent to the
    /// server); without one the address stays unspecified until a REPLY.
    pub fn allocate(
        &mut self,
        interface: InterfaceId,
        instance: ClientInstanceId,
        client_duid: Rc<Duid>,
        prefix: Option<Ipv6Addr>,
        server_address: Ipv6Addr,
    ) -> Result<SessionHandle> {
        let iaid = self.unique_iaid();
        let session = ServerSession {
            interface,
            instance,
            client_duid,
            server_duid: ServerDuidBuffer::new(),
            iaid,
            address: prefix.unwrap_or(Ipv6Addr::UNSPECIFIED),
            preferred_lifetime: 0,
            valid_lifetime: 0,
            t1: 0,
            t2: 0,
            transaction: None,
            server_address,
            valid: false,
        };

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots
                    .try_reserve(1)
                    .map_err(|_| Error::OutOfMemory("session slot".into()))?;
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.session = Some(session);
        Ok(SessionHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Release a session; its handle stops resolving
    pub fn free(&mut self, handle: SessionHandle) -> Option<ServerSession> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.session.is_none() {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        slot.session.take()
    }

    /// Resolve a handle, rejecting stale ones
    pub fn get(&self, handle: SessionHandle) -> Option<&ServerSession> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.session.as_ref())
    }

    pub fn get_mut(&mut self, handle: SessionHandle) -> Option<&mut ServerSession> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.session.as_mut())
    }

    pub fn contains(&self, handle: SessionHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Iterate over live sessions
    pub fn iter(&self) -> impl Iterator<Item = (SessionHandle, &ServerSession)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.session.as_ref().map(|session| {
                (
                    SessionHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    session,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, pred: impl Fn(&ServerSession) -> bool) -> Option<SessionHandle> {
        self.iter().find(|(_, s)| pred(s)).map(|(h, _)| h)
    }

    pub fn find_by_iaid(&self, iaid: u32) -> Option<SessionHandle> {
        self.find(|s| s.iaid == iaid)
    }

    pub fn find_by_instance(&self, instance: ClientInstanceId) -> Option<SessionHandle> {
        self.find(|s| s.instance == instance)
    }

    pub fn find_by_interface(&self, interface: InterfaceId) -> Option<SessionHandle> {
        self.find(|s| s.interface == interface)
    }

    /// Session on `interface` whose address shares the /64 of `prefix`
    pub fn find_by_prefix(&self, interface: InterfaceId, prefix: &Ipv6Addr) -> Option<SessionHandle> {
        self.find(|s| s.interface == interface && same_prefix64(&s.address, prefix))
    }
}
