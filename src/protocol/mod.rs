//! Wire formats
//!
//! DHCPv6 message parsing and building plus the link-layer types used to
//! derive client identifiers.

pub mod dhcpv6;
pub mod types;

pub use types::*;
