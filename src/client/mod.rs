//! DHCPv6 client
//!
//! Per-interface clients that acquire a global address with SOLICIT, keep it
//! alive with RENEW and release it on teardown. All state lives in
//! [`Dhcp6ClientService`]; sockets and the address table stay behind the
//! [`DhcpTransport`] and [`InterfaceStack`] traits.

mod address;
mod notify;
mod registry;
mod renew;
mod reply;
mod request;
mod service;
mod session;
mod stack;

pub use address::{renewal_seconds, seconds_to_ticks, DHCP_PREFIX_LEN, MAX_TIMER_TICKS, TICKS_PER_SECOND};
pub use notify::{option_notifications, OptionNotification, ServerInfo};
pub use registry::{ClientConfig, ClientRegistry, GlobalAddressCallback, OptionNotifyCallback};
pub use renew::{AddressEventReason, RenewalOutcome, RETRY_TICKS};
pub use service::Dhcp6ClientService;
pub use session::{ClientInstanceId, ServerDuidBuffer, ServerSession, SessionHandle, SessionStore};
pub use stack::{
    AddressSource, BindingObserver, ChannelId, ChannelRole, DhcpTransport, InterfaceStack, NewAddress,
    RetryTiming, TransactionId,
};
