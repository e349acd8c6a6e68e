//! In-memory collaborators
//!
//! A loopback transport, an interface table with timers and a small
//! responder. Together they run the client through SOLICIT, REPLY and
//! timer-driven renewals without sockets.

mod responder;
mod stack;
mod transport;

pub use responder::Responder;
pub use stack::{AddressEntry, MemoryStack};
pub use transport::{ChannelState, LoopbackTransport, SentRequest};

use crate::client::{AddressEventReason, Dhcp6ClientService, RenewalOutcome};
use crate::protocol::dhcpv6::Dhcp6Header;
use crate::Result;
use tracing::warn;

/// Service wired to the in-memory collaborators
pub type SimService = Dhcp6ClientService<LoopbackTransport, MemoryStack>;

/// Answer every queued request and deliver the replies.
///
/// Returns how many replies the client accepted.
pub fn run_exchange(service: &mut SimService, responder: &mut Responder) -> Result<usize> {
    let mut accepted = 0;
    for request in service.transport_mut().take_pending() {
        let reply = responder.respond(&request.message)?;
        let header = Dhcp6Header::parse(&reply)?;
        match service.on_reply(request.session, header.msg_type(), header.options_raw()) {
            Ok(()) => accepted += 1,
            Err(e) => warn!(transaction = %request.transaction, "reply not applied: {}", e),
        }
    }
    Ok(accepted)
}

/// Advance the address timers by `ticks` and fire the expired ones
pub fn fire_timers(service: &mut SimService, ticks: u32) -> Vec<RenewalOutcome> {
    let expired = service.stack_mut().advance(ticks);
    expired
        .into_iter()
        .map(|(interface, address)| {
            service.on_address_event(interface, Some(address), AddressEventReason::Timer)
        })
        .collect()
}
