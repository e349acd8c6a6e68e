//! DHCPv6 protocol - RFC 8415
//!
//! Message parsing, building and size computation for the client side of
//! address acquisition (SOLICIT/RENEW out, REPLY in).

use crate::error::ProtocolViolation;
use crate::protocol::types::{HardwareAddr, LinkType};
use crate::{Error, Result};
use rand::Rng;
use std::net::Ipv6Addr;

/// Fixed header size (msg-type + transaction-id)
pub const DHCP6_HEADER_SIZE: usize = 4;

/// Option header size (code + length)
pub const OPTION_HEADER_SIZE: usize = 4;

/// Minimum packet size (header only, options are optional)
pub const MIN_PACKET_SIZE: usize = DHCP6_HEADER_SIZE;

/// Lifetime value meaning "infinity"
pub const INFINITE_LIFETIME: u32 = 0xFFFF_FFFF;

/// All_DHCP_Relay_Agents_and_Servers multicast address (ff02::1:2)
pub const ALL_DHCP_SERVERS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 1, 2);

/// DHCPv6 message types (RFC 8415 Section 7.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Dhcp6MessageType {
    Solicit = 1,
    Advertise = 2,
    Request = 3,
    Confirm = 4,
    Renew = 5,
    Rebind = 6,
    Reply = 7,
    Release = 8,
    Decline = 9,
    Reconfigure = 10,
    InformationRequest = 11,
    RelayForward = 12,
    RelayReply = 13,
}

impl Dhcp6MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Dhcp6MessageType::Solicit),
            2 => Some(Dhcp6MessageType::Advertise),
            3 => Some(Dhcp6MessageType::Request),
            4 => Some(Dhcp6MessageType::Confirm),
            5 => Some(Dhcp6MessageType::Renew),
            6 => Some(Dhcp6MessageType::Rebind),
            7 => Some(Dhcp6MessageType::Reply),
            8 => Some(Dhcp6MessageType::Release),
            9 => Some(Dhcp6MessageType::Decline),
            10 => Some(Dhcp6MessageType::Reconfigure),
            11 => Some(Dhcp6MessageType::InformationRequest),
            12 => Some(Dhcp6MessageType::RelayForward),
            13 => Some(Dhcp6MessageType::RelayReply),
            _ => None,
        }
    }
}

/// DHCPv6 option codes (RFC 8415, RFC 3646)
pub mod options {
    pub const CLIENT_ID: u16 = 1;
    pub const SERVER_ID: u16 = 2;
    pub const IA_NA: u16 = 3;
    pub const IA_ADDR: u16 = 5;
    pub const ELAPSED_TIME: u16 = 8;
    pub const STATUS_CODE: u16 = 13;
    pub const VENDOR_CLASS: u16 = 16;
    pub const VENDOR_OPTS: u16 = 17; // Vendor-specific information
    pub const DNS_SERVERS: u16 = 23; // RFC 3646
    pub const DOMAIN_LIST: u16 = 24; // RFC 3646
}

/// DHCPv6 status codes (RFC 8415 Section 21.13)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusCode {
    Success = 0,
    UnspecFail = 1,
    NoAddrsAvail = 2,
    NoBinding = 3,
    NotOnLink = 4,
    UseMulticast = 5,
    NoPrefixAvail = 6,
}

impl StatusCode {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(StatusCode::Success),
            1 => Some(StatusCode::UnspecFail),
            2 => Some(StatusCode::NoAddrsAvail),
            3 => Some(StatusCode::NoBinding),
            4 => Some(StatusCode::NotOnLink),
            5 => Some(StatusCode::UseMulticast),
            6 => Some(StatusCode::NoPrefixAvail),
            _ => None,
        }
    }
}

/// DUID types (RFC 8415 Section 11)
pub mod duid_type {
    pub const LINK_LAYER: u16 = 3;
}

/// Owned DUID: type plus the identifier body that follows it on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duid {
    pub duid_type: u16,
    pub data: Vec<u8>,
}

impl Duid {
    /// Generate a DUID-LL (hardware type + link-layer address)
    pub fn link_layer(link_type: LinkType, hw: &HardwareAddr) -> Self {
        let link = hw.as_link_bytes(link_type);
        let mut data = Vec::with_capacity(2 + link.len());
        data.extend_from_slice(&(link_type as u16).to_be_bytes());
        data.extend_from_slice(link);
        Duid {
            duid_type: duid_type::LINK_LAYER,
            data,
        }
    }

    pub fn as_view(&self) -> DuidRef<'_> {
        DuidRef {
            duid_type: self.duid_type,
            data: &self.data,
        }
    }

    /// Length on the wire including the 2-byte type
    pub fn encoded_len(&self) -> usize {
        2 + self.data.len()
    }

    /// Serialize DUID to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_view().to_bytes()
    }
}

/// Borrowed DUID view into a parsed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuidRef<'a> {
    pub duid_type: u16,
    pub data: &'a [u8],
}

impl<'a> DuidRef<'a> {
    /// Parse DUID from option data
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(Error::Parse("DUID too short".into()));
        }

        Ok(DuidRef {
            duid_type: u16::from_be_bytes([data[0], data[1]]),
            data: &data[2..],
        })
    }

    /// Length on the wire including the 2-byte type
    pub fn encoded_len(&self) -> usize {
        2 + self.data.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.extend_from_slice(&self.duid_type.to_be_bytes());
        bytes.extend_from_slice(self.data);
        bytes
    }

    pub fn to_duid(&self) -> Duid {
        Duid {
            duid_type: self.duid_type,
            data: self.data.to_vec(),
        }
    }
}

/// IA Address option (RFC 8415 Section 21.6)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IaAddress {
    pub address: Ipv6Addr,
    pub preferred_lifetime: u32,
    pub valid_lifetime: u32,
}

impl IaAddress {
    /// Encoded size of the option body
    pub const LEN: usize = 24;

    /// Parse IA Address from option data
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(Error::Parse("IA Address too short".into()));
        }

        let mut addr_bytes = [0u8; 16];
        addr_bytes.copy_from_slice(&data[0..16]);

        Ok(IaAddress {
            address: Ipv6Addr::from(addr_bytes),
            preferred_lifetime: u32::from_be_bytes([data[16], data[17], data[18], data[19]]),
            valid_lifetime: u32::from_be_bytes([data[20], data[21], data[22], data[23]]),
        })
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::LEN);
        bytes.extend_from_slice(&self.address.octets());
        bytes.extend_from_slice(&self.preferred_lifetime.to_be_bytes());
        bytes.extend_from_slice(&self.valid_lifetime.to_be_bytes());
        bytes
    }
}

/// IA_NA option (RFC 8415 Section 21.4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IaNa {
    pub iaid: u32,
    pub t1: u32,
    pub t2: u32,
    pub addresses: Vec<IaAddress>,
    pub status: Option<(StatusCode, String)>,
}

impl IaNa {
    /// Encoded size of the fixed part (IAID, T1, T2)
    pub const FIXED_LEN: usize = 12;

    /// Parse IA_NA from option data
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::FIXED_LEN {
            return Err(Error::Parse("IA_NA too short".into()));
        }

        let iaid = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let t1 = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let t2 = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut addresses = Vec::new();
        let mut status = None;

        for opt in OptionIter::new(&data[Self::FIXED_LEN..]) {
            match opt.code {
                options::IA_ADDR => {
                    if let Ok(addr) = IaAddress::parse(opt.data) {
                        addresses.push(addr);
                    }
                }
                options::STATUS_CODE => {
                    if opt.data.len() >= 2 {
                        let code = u16::from_be_bytes([opt.data[0], opt.data[1]]);
                        let msg = String::from_utf8_lossy(&opt.data[2..]).to_string();
                        if let Some(sc) = StatusCode::from_u16(code) {
                            status = Some((sc, msg));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(IaNa {
            iaid,
            t1,
            t2,
            addresses,
            status,
        })
    }

    /// Serialize to bytes with addresses
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            Self::FIXED_LEN + self.addresses.len() * (OPTION_HEADER_SIZE + IaAddress::LEN),
        );
        bytes.extend_from_slice(&self.iaid.to_be_bytes());
        bytes.extend_from_slice(&self.t1.to_be_bytes());
        bytes.extend_from_slice(&self.t2.to_be_bytes());

        for addr in &self.addresses {
            let addr_bytes = addr.to_bytes();
            bytes.extend_from_slice(&options::IA_ADDR.to_be_bytes());
            bytes.extend_from_slice(&(addr_bytes.len() as u16).to_be_bytes());
            bytes.extend_from_slice(&addr_bytes);
        }

        if let Some((code, msg)) = &self.status {
            bytes.extend_from_slice(&options::STATUS_CODE.to_be_bytes());
            bytes.extend_from_slice(&((2 + msg.len()) as u16).to_be_bytes());
            bytes.extend_from_slice(&(*code as u16).to_be_bytes());
            bytes.extend_from_slice(msg.as_bytes());
        }

        bytes
    }
}

/// Find option by code in an option stream, returns option data
pub fn find_option(opts: &[u8], code: u16) -> Option<&[u8]> {
    OptionIter::new(opts).find(|o| o.code == code).map(|o| o.data)
}

/// Parsed DHCPv6 header (zero-copy reference)
#[derive(Debug)]
pub struct Dhcp6Header<'a> {
    buffer: &'a [u8],
}

impl<'a> Dhcp6Header<'a> {
    /// Parse DHCPv6 message from buffer
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < MIN_PACKET_SIZE {
            return Err(Error::Parse("DHCPv6 message too short".into()));
        }

        Ok(Self { buffer })
    }

    /// Message type (1 byte)
    pub fn msg_type(&self) -> u8 {
        self.buffer[0]
    }

    /// Get typed message type
    pub fn message_type(&self) -> Option<Dhcp6MessageType> {
        Dhcp6MessageType::from_u8(self.msg_type())
    }

    /// Transaction ID (24 bits)
    pub fn transaction_id(&self) -> u32 {
        u32::from_be_bytes([0, self.buffer[1], self.buffer[2], self.buffer[3]])
    }

    /// Options section (after header)
    pub fn options_raw(&self) -> &'a [u8] {
        &self.buffer[DHCP6_HEADER_SIZE..]
    }

    /// Find option by code, returns option data (without code and length)
    pub fn find_option(&self, code: u16) -> Option<&'a [u8]> {
        find_option(self.options_raw(), code)
    }

    /// Get Client ID DUID
    pub fn client_id(&self) -> Option<DuidRef<'a>> {
        self.find_option(options::CLIENT_ID)
            .and_then(|data| DuidRef::parse(data).ok())
    }

    /// Get Server ID DUID
    pub fn server_id(&self) -> Option<DuidRef<'a>> {
        self.find_option(options::SERVER_ID)
            .and_then(|data| DuidRef::parse(data).ok())
    }

    /// Get IA_NA option
    pub fn ia_na(&self) -> Option<IaNa> {
        self.find_option(options::IA_NA)
            .and_then(|data| IaNa::parse(data).ok())
    }

    /// Vendor class option as (enterprise number, first class-data entry)
    pub fn vendor_class(&self) -> Option<(u32, &'a [u8])> {
        let data = self.find_option(options::VENDOR_CLASS)?;
        if data.len() < 6 {
            return None;
        }
        let enterprise = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let len = u16::from_be_bytes([data[4], data[5]]) as usize;
        data.get(6..6 + len).map(|class| (enterprise, class))
    }
}

/// Iterator over DHCPv6 options
///
/// Stops at the first record whose declared length runs past the buffer.
#[derive(Debug, Clone)]
pub struct OptionIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> OptionIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

/// A single DHCPv6 option
#[derive(Debug, Clone, Copy)]
pub struct Dhcp6Option<'a> {
    pub code: u16,
    pub data: &'a [u8],
}

impl<'a> Iterator for OptionIter<'a> {
    type Item = Dhcp6Option<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + OPTION_HEADER_SIZE > self.data.len() {
            return None;
        }

        let code = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        let len = u16::from_be_bytes([self.data[self.pos + 2], self.data[self.pos + 3]]) as usize;
        let data_start = self.pos + OPTION_HEADER_SIZE;
        let data_end = data_start + len;

        if data_end > self.data.len() {
            self.pos = self.data.len();
            return None;
        }

        self.pos = data_end;
        Some(Dhcp6Option {
            code,
            data: &self.data[data_start..data_end],
        })
    }
}

/// Granted binding carried in a REPLY's IA_NA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantedAddress {
    pub iaid: u32,
    pub t1: u32,
    pub t2: u32,
    pub address: Ipv6Addr,
    pub preferred_lifetime: u32,
    pub valid_lifetime: u32,
}

/// Mandatory options of a REPLY
#[derive(Debug, Clone)]
pub struct ReplyOptions<'a> {
    pub client_id: DuidRef<'a>,
    pub server_id: DuidRef<'a>,
    pub granted: GrantedAddress,
}

/// Extract and validate the mandatory options of a REPLY option stream.
///
/// Client and server identifiers plus an IA_NA with at least one IA_ADDR
/// are required. An IA_NA status other than Success is refused.
pub fn parse_reply_options(opts: &[u8]) -> std::result::Result<ReplyOptions<'_>, ProtocolViolation> {
    let client_id = find_option(opts, options::CLIENT_ID)
        .ok_or(ProtocolViolation::MissingOption("client identifier"))?;
    let client_id = DuidRef::parse(client_id)
        .map_err(|_| ProtocolViolation::MalformedOption("client identifier"))?;

    let server_id = find_option(opts, options::SERVER_ID)
        .ok_or(ProtocolViolation::MissingOption("server identifier"))?;
    let server_id = DuidRef::parse(server_id)
        .map_err(|_| ProtocolViolation::MalformedOption("server identifier"))?;

    let ia_na = find_option(opts, options::IA_NA).ok_or(ProtocolViolation::MissingOption("IA_NA"))?;
    let ia_na = IaNa::parse(ia_na).map_err(|_| ProtocolViolation::MalformedOption("IA_NA"))?;

    if let Some((status, _)) = &ia_na.status {
        if *status != StatusCode::Success {
            return Err(ProtocolViolation::Status(*status as u16));
        }
    }

    let addr = ia_na
        .addresses
        .first()
        .ok_or(ProtocolViolation::MissingOption("IA address"))?;

    Ok(ReplyOptions {
        client_id,
        server_id,
        granted: GrantedAddress {
            iaid: ia_na.iaid,
            t1: ia_na.t1,
            t2: ia_na.t2,
            address: addr.address,
            preferred_lifetime: addr.preferred_lifetime,
            valid_lifetime: addr.valid_lifetime,
        },
    })
}

/// Generate a random non-zero 24-bit transaction ID
pub fn generate_transaction_id() -> u32 {
    rand::thread_rng().gen_range(1..=0x00FF_FFFF)
}

/// Size of a SOLICIT/RENEW carrying one IA_NA.
///
/// `server_duid_len` is the encoded server DUID length (0 = no Server
/// Identifier option). `with_address` adds one IA_ADDR sub-option.
pub fn ia_na_message_len(client_duid_len: usize, server_duid_len: usize, with_address: bool) -> usize {
    let mut len = DHCP6_HEADER_SIZE;
    len += OPTION_HEADER_SIZE + client_duid_len;
    if server_duid_len > 0 {
        len += OPTION_HEADER_SIZE + server_duid_len;
    }
    len += OPTION_HEADER_SIZE + 2; // elapsed time
    len += OPTION_HEADER_SIZE + IaNa::FIXED_LEN;
    if with_address {
        len += OPTION_HEADER_SIZE + IaAddress::LEN;
    }
    len
}

/// Size of a SOLICIT (never carries a Server Identifier)
pub fn solicit_message_len(client_duid_len: usize, with_address: bool) -> usize {
    ia_na_message_len(client_duid_len, 0, with_address)
}

/// Size of a RENEW
pub fn renew_message_len(client_duid_len: usize, server_duid_len: usize, with_address: bool) -> usize {
    ia_na_message_len(client_duid_len, server_duid_len, with_address)
}

/// Size of a Vendor Class option holding a single class-data entry
pub fn vendor_class_option_len(class_data: &str) -> usize {
    OPTION_HEADER_SIZE + 4 + 2 + class_data.len()
}

/// DHCPv6 message builder
///
/// Writes directly into the buffer it was given, so a caller that reserved
/// the exact size up front never reallocates.
#[derive(Debug, Clone)]
pub struct Dhcp6Builder {
    buffer: Vec<u8>,
}

impl Dhcp6Builder {
    /// Create a new builder with specified message type
    pub fn new(msg_type: Dhcp6MessageType) -> Self {
        Self::with_buffer(msg_type, Vec::new())
    }

    /// Create a builder writing into an existing (cleared) buffer
    pub fn with_buffer(msg_type: Dhcp6MessageType, mut buffer: Vec<u8>) -> Self {
        buffer.clear();
        buffer.push(msg_type as u8);
        buffer.extend_from_slice(&[0, 0, 0]);
        Self { buffer }
    }

    /// Set transaction ID (only lower 24 bits used)
    pub fn transaction_id(mut self, xid: u32) -> Self {
        let xid_bytes = (xid & 0x00FF_FFFF).to_be_bytes();
        self.buffer[1..4].copy_from_slice(&xid_bytes[1..4]);
        self
    }

    /// Add Client ID option
    pub fn client_id(mut self, duid: DuidRef<'_>) -> Self {
        self.add_duid_option(options::CLIENT_ID, duid);
        self
    }

    /// Add Server ID option
    pub fn server_id(mut self, duid: DuidRef<'_>) -> Self {
        self.add_duid_option(options::SERVER_ID, duid);
        self
    }

    /// Add IA_NA option without addresses
    pub fn ia_na(self, iaid: u32, t1: u32, t2: u32) -> Self {
        self.ia_na_with_addresses(&IaNa {
            iaid,
            t1,
            t2,
            addresses: Vec::new(),
            status: None,
        })
    }

    /// Add IA_NA option with its address and status sub-options
    pub fn ia_na_with_addresses(mut self, ia_na: &IaNa) -> Self {
        self.add_option(options::IA_NA, &ia_na.to_bytes());
        self
    }

    /// Add Elapsed Time option
    pub fn elapsed_time(mut self, centiseconds: u16) -> Self {
        self.add_option(options::ELAPSED_TIME, &centiseconds.to_be_bytes());
        self
    }

    /// Add Vendor Class option with a single class-data entry
    pub fn vendor_class(mut self, enterprise_number: u32, class_data: &str) -> Self {
        let len = 4 + 2 + class_data.len();
        self.put_option_header(options::VENDOR_CLASS, len);
        self.buffer.extend_from_slice(&enterprise_number.to_be_bytes());
        self.buffer
            .extend_from_slice(&(class_data.len() as u16).to_be_bytes());
        self.buffer.extend_from_slice(class_data.as_bytes());
        self
    }

    /// Add DNS Recursive Name Server option
    pub fn dns_servers(mut self, servers: &[Ipv6Addr]) -> Self {
        let data: Vec<u8> = servers.iter().flat_map(|s| s.octets()).collect();
        self.add_option(options::DNS_SERVERS, &data);
        self
    }

    /// Add an arbitrary option
    pub fn option(mut self, code: u16, data: &[u8]) -> Self {
        self.add_option(code, data);
        self
    }

    fn add_duid_option(&mut self, code: u16, duid: DuidRef<'_>) {
        self.put_option_header(code, duid.encoded_len());
        self.buffer.extend_from_slice(&duid.duid_type.to_be_bytes());
        self.buffer.extend_from_slice(duid.data);
    }

    fn put_option_header(&mut self, code: u16, len: usize) {
        self.buffer.extend_from_slice(&code.to_be_bytes());
        self.buffer.extend_from_slice(&(len as u16).to_be_bytes());
    }

    /// Add raw option
    fn add_option(&mut self, code: u16, data: &[u8]) {
        self.put_option_header(code, data.len());
        self.buffer.extend_from_slice(data);
    }

    /// Build the DHCPv6 message
    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}
