//! dhcp6c - DHCPv6 client for embedded IPv6 mesh interfaces
//!
//! Acquires a global address per interface with SOLICIT/REPLY, renews it
//! from the address timer and releases it on teardown. Transport and the
//! interface address table are supplied by the host stack through traits;
//! `sim` provides in-memory versions of both.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod sim;
pub mod telemetry;

pub use error::{Error, Result};
