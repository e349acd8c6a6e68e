//! Loopback transport
//!
//! Queues every request instead of sending it. Callers take the queued
//! requests, answer them, and feed the answers to
//! [`Dhcp6ClientService::on_reply`](crate::client::Dhcp6ClientService::on_reply).

use crate::client::{ChannelId, ChannelRole, DhcpTransport, RetryTiming, SessionHandle, TransactionId};
use crate::protocol::dhcpv6::Dhcp6Header;
use crate::protocol::InterfaceId;
use std::collections::HashMap;
use std::net::Ipv6Addr;
use tracing::trace;

/// A request the client asked to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub channel: ChannelId,
    pub session: SessionHandle,
    pub destination: Ipv6Addr,
    pub transaction: TransactionId,
    pub message: Vec<u8>,
    pub retry: Option<RetryTiming>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelState {
    pub interface: InterfaceId,
    pub role: ChannelRole,
    pub relay_server: Option<Ipv6Addr>,
    pub relay_interface_id: bool,
    pub relay_global_address: Option<Ipv6Addr>,
}

#[derive(Debug, Default)]
pub struct LoopbackTransport {
    next_channel: u16,
    channels: HashMap<ChannelId, ChannelState>,
    pending: Vec<SentRequest>,
    cancelled: Vec<SessionHandle>,
    sent: usize,
    /// Refuse the next `open_channel`
    pub fail_next_open: bool,
    /// Refuse the next `send`
    pub fail_next_send: bool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self, channel: ChannelId) -> Option<&ChannelState> {
        self.channels.get(&channel)
    }

    pub fn is_open(&self, channel: ChannelId) -> bool {
        self.channels.contains_key(&channel)
    }

    /// Requests sent and not yet taken or cancelled
    pub fn pending(&self) -> &[SentRequest] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<SentRequest> {
        std::mem::take(&mut self.pending)
    }

    /// Total requests accepted since creation
    pub fn sent_count(&self) -> usize {
        self.sent
    }

    /// Sessions whose retransmissions were cancelled, in call order
    pub fn cancelled(&self) -> &[SessionHandle] {
        &self.cancelled
    }

    /// Global address the relay channel advertises
    pub fn set_relay_global_address(&mut self, channel: ChannelId, address: Option<Ipv6Addr>) {
        if let Some(state) = self.channels.get_mut(&channel) {
            state.relay_global_address = address;
        }
    }

    fn pending_mut(&mut self, transaction: TransactionId) -> Option<&mut SentRequest> {
        self.pending.iter_mut().find(|r| r.transaction == transaction)
    }
}

impl DhcpTransport for LoopbackTransport {
    fn open_channel(&mut self, interface: InterfaceId, role: ChannelRole) -> Option<ChannelId> {
        if std::mem::take(&mut self.fail_next_open) {
            return None;
        }
        self.next_channel += 1;
        let channel = ChannelId(self.next_channel);
        self.channels.insert(
            channel,
            ChannelState {
                interface,
                role,
                relay_server: None,
                relay_interface_id: false,
                relay_global_address: None,
            },
        );
        Some(channel)
    }

    fn close_channel(&mut self, channel: ChannelId) {
        self.channels.remove(&channel);
        self.pending.retain(|r| r.channel != channel);
    }

    fn send(
        &mut self,
        channel: ChannelId,
        session: SessionHandle,
        destination: Ipv6Addr,
        message: Vec<u8>,
    ) -> Option<TransactionId> {
        if std::mem::take(&mut self.fail_next_send) || !self.is_open(channel) {
            return None;
        }
        let transaction = Dhcp6Header::parse(&message)
            .ok()
            .and_then(|header| TransactionId::new(header.transaction_id()))?;

        trace!(?channel, %destination, %transaction, len = message.len(), "loopback send");
        self.pending.push(SentRequest {
            channel,
            session,
            destination,
            transaction,
            message,
            retry: None,
        });
        self.sent += 1;
        Some(transaction)
    }

    fn set_retry_timing(&mut self, transaction: TransactionId, timing: RetryTiming) {
        if let Some(request) = self.pending_mut(transaction) {
            request.retry = Some(timing);
        }
    }

    fn update_server_address(&mut self, transaction: TransactionId, server: Ipv6Addr) {
        if let Some(request) = self.pending_mut(transaction) {
            request.destination = server;
        }
    }

    fn cancel_all(&mut self, session: SessionHandle) {
        self.pending.retain(|r| r.session != session);
        self.cancelled.push(session);
    }

    fn enable_relay(&mut self, channel: ChannelId, server: Ipv6Addr) {
        if let Some(state) = self.channels.get_mut(&channel) {
            state.relay_server = Some(server);
        }
    }

    fn set_relay_interface_id_option(&mut self, channel: ChannelId, enabled: bool) {
        if let Some(state) = self.channels.get_mut(&channel) {
            state.relay_interface_id = enabled;
        }
    }

    fn relay_global_address(&self, channel: ChannelId) -> Option<Ipv6Addr> {
        self.channels.get(&channel)?.relay_global_address
    }
}
