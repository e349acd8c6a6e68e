//! Minimal DHCPv6 server
//!
//! Answers SOLICIT and RENEW with a REPLY granting one address per
//! (client DUID, IAID). A requested address hint picks the /64 the address
//! is allocated from; otherwise the pool prefix is used. Enough to drive
//! the client through full exchanges without a network.

use crate::protocol::dhcpv6::{
    options, Dhcp6Builder, Dhcp6Header, Dhcp6MessageType, Duid, IaAddress, IaNa,
};
use crate::protocol::PREFIX64_LEN;
use crate::{Error, Result};
use std::collections::HashMap;
use std::net::Ipv6Addr;
use tracing::debug;

pub struct Responder {
    duid: Duid,
    pool: Ipv6Addr,
    next_host: u64,
    leases: HashMap<(Vec<u8>, u32), Ipv6Addr>,
    t1: u32,
    t2: u32,
    preferred_lifetime: u32,
    valid_lifetime: u32,
    dns_servers: Vec<Ipv6Addr>,
    enterprise_number: u32,
    vendor_data: Option<Vec<u8>>,
}

impl Responder {
    pub fn new(duid: Duid, pool: Ipv6Addr) -> Self {
        Self {
            duid,
            pool,
            next_host: 0x100,
            leases: HashMap::new(),
            t1: 0,
            t2: 0,
            preferred_lifetime: 1800,
            valid_lifetime: 3600,
            dns_servers: Vec::new(),
            enterprise_number: 0,
            vendor_data: None,
        }
    }

    pub fn with_lifetimes(mut self, preferred: u32, valid: u32) -> Self {
        self.preferred_lifetime = preferred;
        self.valid_lifetime = valid;
        self
    }

    pub fn with_timers(mut self, t1: u32, t2: u32) -> Self {
        self.t1 = t1;
        self.t2 = t2;
        self
    }

    pub fn with_dns_servers(mut self, servers: Vec<Ipv6Addr>) -> Self {
        self.dns_servers = servers;
        self
    }

    /// Attach a Vendor-specific Information option to every REPLY
    pub fn with_vendor_data(mut self, enterprise_number: u32, data: Vec<u8>) -> Self {
        self.enterprise_number = enterprise_number;
        self.vendor_data = Some(data);
        self
    }

    pub fn duid(&self) -> &Duid {
        &self.duid
    }

    /// Address leased to a client identity, if any
    pub fn lease(&self, client_duid: &[u8], iaid: u32) -> Option<Ipv6Addr> {
        self.leases.get(&(client_duid.to_vec(), iaid)).copied()
    }

    fn allocate(&mut self, prefix: Ipv6Addr) -> Ipv6Addr {
        let mut octets = prefix.octets();
        octets[PREFIX64_LEN..].copy_from_slice(&self.next_host.to_be_bytes());
        self.next_host += 1;
        Ipv6Addr::from(octets)
    }

    /// Build the REPLY for a client request
    pub fn respond(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        let header = Dhcp6Header::parse(request)?;
        match header.message_type() {
            Some(Dhcp6MessageType::Solicit) | Some(Dhcp6MessageType::Renew) => {}
            _ => {
                return Err(Error::Parse(format!(
                    "unsupported message type {}",
                    header.msg_type()
                )))
            }
        }

        let client_id = header
            .client_id()
            .ok_or_else(|| Error::Parse("request without client identifier".into()))?;
        let ia_na = header
            .ia_na()
            .ok_or_else(|| Error::Parse("request without IA_NA".into()))?;

        let key = (client_id.to_bytes(), ia_na.iaid);
        let address = match self.leases.get(&key) {
            Some(address) => *address,
            None => {
                let prefix = ia_na
                    .addresses
                    .first()
                    .map(|hint| hint.address)
                    .unwrap_or(self.pool);
                let address = self.allocate(prefix);
                self.leases.insert(key, address);
                address
            }
        };
        debug!(%address, iaid = ia_na.iaid, "responder lease");

        let mut builder = Dhcp6Builder::new(Dhcp6MessageType::Reply)
            .transaction_id(header.transaction_id())
            .client_id(client_id)
            .server_id(self.duid.as_view())
            .ia_na_with_addresses(&IaNa {
                iaid: ia_na.iaid,
                t1: self.t1,
                t2: self.t2,
                addresses: vec![IaAddress {
                    address,
                    preferred_lifetime: self.preferred_lifetime,
                    valid_lifetime: self.valid_lifetime,
                }],
                status: None,
            });
        if !self.dns_servers.is_empty() {
            builder = builder.dns_servers(&self.dns_servers);
        }
        if let Some(data) = &self.vendor_data {
            let mut payload = self.enterprise_number.to_be_bytes().to_vec();
            payload.extend_from_slice(data);
            builder = builder.option(options::VENDOR_OPTS, &payload);
        }
        Ok(builder.build())
    }
}
