//! Common protocol types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// Network interface identifier as assigned by the stack
pub type InterfaceId = u16;

/// Bytes of an address compared when matching a routed /64 prefix
pub const PREFIX64_LEN: usize = 8;

/// Returns true when both addresses share the same leading /64
pub fn same_prefix64(a: &Ipv6Addr, b: &Ipv6Addr) -> bool {
    a.octets()[..PREFIX64_LEN] == b.octets()[..PREFIX64_LEN]
}

/// Link-layer hardware types used to build DUID-LL identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum LinkType {
    /// 48-bit Ethernet MAC (ARP hardware type 1)
    Eui48 = 1,
    /// 64-bit IEEE EUI-64 (ARP hardware type 27)
    #[default]
    Eui64 = 27,
}

impl LinkType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(LinkType::Eui48),
            27 => Some(LinkType::Eui64),
            _ => None,
        }
    }

    /// Number of link-layer address bytes carried in a DUID-LL
    pub fn address_len(self) -> usize {
        match self {
            LinkType::Eui48 => 6,
            LinkType::Eui64 => 8,
        }
    }
}

/// Interface hardware address, stored as 8 bytes (EUI-48 uses the first 6)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HardwareAddr(pub [u8; 8]);

impl HardwareAddr {
    /// Build from a 48-bit MAC address
    pub fn from_mac(mac: [u8; 6]) -> Self {
        let mut bytes = [0u8; 8];
        bytes[..6].copy_from_slice(&mac);
        HardwareAddr(bytes)
    }

    /// Link-layer bytes for the given link type
    pub fn as_link_bytes(&self, link_type: LinkType) -> &[u8] {
        &self.0[..link_type.address_len()]
    }
}

impl fmt::Debug for HardwareAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| format!("{:02x}", b)).collect();
        write!(f, "{}", parts.join(":"))
    }
}

impl fmt::Display for HardwareAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Error type for hardware address parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHardwareAddrError {
    kind: ParseHardwareAddrErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseHardwareAddrErrorKind {
    Length,
    Format,
    Hex,
}

impl fmt::Display for ParseHardwareAddrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParseHardwareAddrErrorKind::Length => write!(f, "invalid hardware address length"),
            ParseHardwareAddrErrorKind::Format => write!(f, "invalid hardware address format"),
            ParseHardwareAddrErrorKind::Hex => write!(f, "invalid hex digit in hardware address"),
        }
    }
}

impl std::error::Error for ParseHardwareAddrError {}

impl FromStr for HardwareAddr {
    type Err = ParseHardwareAddrError;

    /// Parse a hardware address from string
    ///
    /// Accepts 6 or 8 groups separated by ':' or '-'. A 6-group address
    /// is stored as EUI-48 with the trailing two bytes zeroed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let groups: Vec<&str> = if s.contains(':') {
            s.split(':').collect()
        } else if s.contains('-') {
            s.split('-').collect()
        } else {
            return Err(ParseHardwareAddrError {
                kind: ParseHardwareAddrErrorKind::Format,
            });
        };

        if groups.len() != 6 && groups.len() != 8 {
            return Err(ParseHardwareAddrError {
                kind: ParseHardwareAddrErrorKind::Length,
            });
        }

        let mut result = [0u8; 8];
        for (i, group) in groups.iter().enumerate() {
            if group.len() != 2 {
                return Err(ParseHardwareAddrError {
                    kind: ParseHardwareAddrErrorKind::Format,
                });
            }
            result[i] = u8::from_str_radix(group, 16).map_err(|_| ParseHardwareAddrError {
                kind: ParseHardwareAddrErrorKind::Hex,
            })?;
        }

        Ok(HardwareAddr(result))
    }
}
