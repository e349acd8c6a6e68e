//! Client state machine tests
//!
//! Drive a service wired to the loopback transport and the in-memory
//! interface table. REPLYs are built by hand from the queued request so
//! each test controls exactly what the server says.

use dhcp6c::client::{
    AddressEventReason, AddressSource, BindingObserver, ChannelRole, Dhcp6ClientService, OptionNotification,
    RenewalOutcome, ServerInfo, SessionHandle, RETRY_TICKS,
};
use dhcp6c::config::{BuildVariant, ServiceConfig};
use dhcp6c::error::ProtocolViolation;
use dhcp6c::protocol::dhcpv6::{
    options, Dhcp6Builder, Dhcp6Header, Dhcp6MessageType, Duid, IaAddress, IaNa,
};
use dhcp6c::protocol::{HardwareAddr, InterfaceId, LinkType};
use dhcp6c::sim::{self, LoopbackTransport, MemoryStack, Responder, SentRequest, SimService};
use dhcp6c::Error;
use std::cell::RefCell;
use std::net::Ipv6Addr;
use std::rc::Rc;

const IFACE: InterfaceId = 3;

fn addr(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

fn server_duid() -> Duid {
    Duid::link_layer(LinkType::Eui48, &HardwareAddr::from_mac([0x02, 0, 0, 0, 0, 0x01]))
}

fn service() -> SimService {
    let mut stack = MemoryStack::new();
    stack.add_interface(IFACE, HardwareAddr([0x02, 0, 0, 0xff, 0xfe, 0, 0, 0x03]));
    Dhcp6ClientService::new(ServiceConfig::default(), LoopbackTransport::new(), stack)
}

fn initialized() -> SimService {
    let mut service = service();
    service.initialize(IFACE, LinkType::Eui64).unwrap();
    service
}

type Completions = Rc<RefCell<Vec<(InterfaceId, Ipv6Addr, Ipv6Addr, bool)>>>;

fn request(service: &mut SimService, server: Ipv6Addr, prefix: Option<Ipv6Addr>) -> Completions {
    let log: Completions = Rc::default();
    let sink = log.clone();
    service
        .request_global_address(
            IFACE,
            server,
            prefix,
            Some(Box::new(
                move |interface: InterfaceId, server: Ipv6Addr, address: Ipv6Addr, success: bool| {
                    sink.borrow_mut().push((interface, server, address, success));
                },
            )),
        )
        .unwrap();
    log
}

/// What the hand-built REPLY grants
struct Grant {
    address: Ipv6Addr,
    t1: u32,
    preferred: u32,
    valid: u32,
    server: Duid,
    client: Option<Duid>,
    iaid: Option<u32>,
    extra: Vec<(u16, Vec<u8>)>,
}

impl Grant {
    fn new(address: &str) -> Self {
        Self {
            address: addr(address),
            t1: 0,
            preferred: 1800,
            valid: 3600,
            server: server_duid(),
            client: None,
            iaid: None,
            extra: Vec::new(),
        }
    }

    fn option(mut self, code: u16, data: Vec<u8>) -> Self {
        self.extra.push((code, data));
        self
    }

    /// REPLY answering `request`, echoing its client DUID and IAID unless overridden
    fn reply_to(&self, request: &SentRequest) -> Vec<u8> {
        let header = Dhcp6Header::parse(&request.message).unwrap();
        let echoed = header.client_id().unwrap().to_duid();
        let client = self.client.as_ref().unwrap_or(&echoed);
        let iaid = self.iaid.unwrap_or_else(|| header.ia_na().unwrap().iaid);

        let mut builder = Dhcp6Builder::new(Dhcp6MessageType::Reply)
            .transaction_id(header.transaction_id())
            .client_id(client.as_view())
            .server_id(self.server.as_view())
            .ia_na_with_addresses(&IaNa {
                iaid,
                t1: self.t1,
                t2: 0,
                addresses: vec![IaAddress {
                    address: self.address,
                    preferred_lifetime: self.preferred,
                    valid_lifetime: self.valid,
                }],
                status: None,
            });
        for (code, data) in &self.extra {
            builder = builder.option(*code, data);
        }
        builder.build()
    }
}

fn deliver(service: &mut SimService, session: SessionHandle, message: &[u8]) -> dhcp6c::Result<()> {
    let header = Dhcp6Header::parse(message)?;
    service.on_reply(session, header.msg_type(), header.options_raw())
}

fn take_one(service: &mut SimService) -> SentRequest {
    let mut pending = service.transport_mut().take_pending();
    assert_eq!(pending.len(), 1, "expected exactly one queued request");
    pending.remove(0)
}

/// Initialize, request inside 2001:db8::/64 and apply a REPLY for `granted`
fn bound(granted: &str) -> (SimService, SessionHandle, Completions) {
    let mut service = initialized();
    let log = request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);
    deliver(&mut service, solicit.session, &Grant::new(granted).reply_to(&solicit)).unwrap();
    (service, solicit.session, log)
}

#[test]
fn test_request_sends_one_solicit() {
    let mut service = initialized();
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));

    let pending = service.transport().pending();
    assert_eq!(pending.len(), 1);
    let solicit = &pending[0];
    assert_eq!(solicit.destination, addr("fe80::1"));

    let header = Dhcp6Header::parse(&solicit.message).unwrap();
    assert_eq!(header.message_type(), Some(Dhcp6MessageType::Solicit));
    assert!(header.server_id().is_none());
    assert_eq!(header.vendor_class(), Some((294, &b"br"[..])));
    let ia_na = header.ia_na().unwrap();
    assert_eq!(ia_na.addresses.len(), 1);
    assert_eq!(ia_na.addresses[0].address, addr("2001:db8::"));

    let session = service.session(solicit.session).unwrap();
    assert!(!session.is_valid());
    assert_eq!(session.transaction(), Some(solicit.transaction));
    assert_ne!(solicit.transaction.get(), 0);
    assert_eq!(session.iaid(), ia_na.iaid);
    assert_eq!(service.stats().solicits_sent.get(), 1);
}

#[test]
fn test_reply_installs_address() {
    let (service, handle, log) = bound("2001:db8::42");

    let session = service.session(handle).unwrap();
    assert!(session.is_valid());
    assert!(session.transaction().is_none());
    assert_eq!(session.address(), addr("2001:db8::42"));
    assert_eq!(session.server_duid().get(), Some(server_duid().as_view()));

    let entry = service.stack().address(IFACE, &addr("2001:db8::42")).unwrap();
    assert_eq!(entry.valid_lifetime, 3600);
    assert_eq!(entry.preferred_lifetime, 1800);
    assert_eq!(entry.prefix_len, 64);
    assert_eq!(entry.source, AddressSource::Dhcp);
    // half of the preferred lifetime, in 100 ms ticks
    assert_eq!(entry.state_timer, 9000);

    assert_eq!(
        log.borrow().as_slice(),
        &[(IFACE, addr("fe80::1"), addr("2001:db8::42"), true)]
    );
    assert_eq!(service.stats().replies_accepted.get(), 1);
}

#[test]
fn test_t1_sets_renewal_timer() {
    let mut service = initialized();
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);
    let mut grant = Grant::new("2001:db8::42");
    grant.t1 = 120;
    deliver(&mut service, solicit.session, &grant.reply_to(&solicit)).unwrap();

    let entry = service.stack().address(IFACE, &addr("2001:db8::42")).unwrap();
    assert_eq!(entry.state_timer, 1200);
    assert_eq!(service.session(solicit.session).unwrap().t1(), 120);
}

#[test]
fn test_stale_handle_rejected() {
    let mut service = initialized();
    let log = request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);
    let reply = Grant::new("2001:db8::42").reply_to(&solicit);
    deliver(&mut service, solicit.session, &reply).unwrap();

    service.global_address_delete(IFACE, addr("2001:db8::")).unwrap();
    assert!(service.stack().addresses(IFACE).is_empty());

    let err = deliver(&mut service, solicit.session, &reply).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(service.stack().addresses(IFACE).is_empty());
    assert!(service.sessions().is_empty());
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn test_wrong_message_type_rejected() {
    let mut service = initialized();
    let log = request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);
    let reply = Grant::new("2001:db8::42").reply_to(&solicit);
    let header = Dhcp6Header::parse(&reply).unwrap();

    let err = service
        .on_reply(solicit.session, Dhcp6MessageType::Advertise as u8, header.options_raw())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolViolation(ProtocolViolation::UnexpectedMessageType(2))
    ));

    let session = service.session(solicit.session).unwrap();
    assert!(!session.is_valid());
    assert!(session.transaction().is_none());
    assert!(service.stack().addresses(IFACE).is_empty());
    assert_eq!(
        log.borrow().as_slice(),
        &[(IFACE, addr("fe80::1"), addr("2001:db8::"), false)]
    );
    assert_eq!(service.stats().replies_rejected.get(), 1);
}

#[test]
fn test_foreign_client_duid_rejected() {
    let mut service = initialized();
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);
    let mut grant = Grant::new("2001:db8::42");
    grant.client = Some(Duid::link_layer(LinkType::Eui48, &HardwareAddr::from_mac([9, 9, 9, 9, 9, 9])));

    let err = deliver(&mut service, solicit.session, &grant.reply_to(&solicit)).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolViolation(ProtocolViolation::ClientDuidMismatch)
    ));
    let session = service.session(solicit.session).unwrap();
    assert!(!session.is_valid());
    assert!(session.server_duid().is_empty());
    assert_eq!(session.address(), addr("2001:db8::"));
    assert!(service.stack().addresses(IFACE).is_empty());
}

#[test]
fn test_unknown_iaid_rejected() {
    let mut service = initialized();
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);
    let iaid = service.session(solicit.session).unwrap().iaid();
    let mut grant = Grant::new("2001:db8::42");
    grant.iaid = Some(iaid.wrapping_add(100));

    let err = deliver(&mut service, solicit.session, &grant.reply_to(&solicit)).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolViolation(ProtocolViolation::SessionMismatch(_))
    ));
    assert!(!service.session(solicit.session).unwrap().is_valid());
    assert!(service.stack().addresses(IFACE).is_empty());
}

#[test]
fn test_reply_without_ia_na_rejected() {
    let mut service = initialized();
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);
    let header = Dhcp6Header::parse(&solicit.message).unwrap();
    let reply = Dhcp6Builder::new(Dhcp6MessageType::Reply)
        .transaction_id(header.transaction_id())
        .client_id(header.client_id().unwrap())
        .server_id(server_duid().as_view())
        .build();

    let err = deliver(&mut service, solicit.session, &reply).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolViolation(ProtocolViolation::MissingOption(_))
    ));
    assert!(service.session(solicit.session).unwrap().transaction().is_none());
}

#[test]
fn test_foreign_renew_reply_keeps_binding() {
    let (mut service, handle, log) = bound("2001:db8::42");
    sim::fire_timers(&mut service, 9000);
    let renew = take_one(&mut service);
    assert_eq!(renew.session, handle);

    let mut grant = Grant::new("2001:db8::99");
    grant.t1 = 60;
    grant.preferred = 600;
    grant.valid = 900;
    grant.server = Duid::link_layer(LinkType::Eui48, &HardwareAddr::from_mac([0x02, 0, 0, 0, 0, 0x77]));
    grant.client = Some(Duid::link_layer(LinkType::Eui48, &HardwareAddr::from_mac([9, 9, 9, 9, 9, 9])));

    let err = deliver(&mut service, handle, &grant.reply_to(&renew)).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolViolation(ProtocolViolation::ClientDuidMismatch)
    ));

    let session = service.session(handle).unwrap();
    assert!(session.is_valid());
    assert!(session.transaction().is_none());
    assert_eq!(session.address(), addr("2001:db8::42"));
    assert_eq!(session.preferred_lifetime(), 1800);
    assert_eq!(session.valid_lifetime(), 3600);
    assert_eq!(session.t1(), 0);
    assert_eq!(session.server_duid().get(), Some(server_duid().as_view()));

    let addresses = service.stack().addresses(IFACE);
    assert_eq!(addresses.len(), 1);
    let entry = &addresses[0];
    assert_eq!(entry.address, addr("2001:db8::42"));
    assert_eq!(entry.preferred_lifetime, 1800);
    assert_eq!(entry.valid_lifetime, 3600);
    assert!(!entry.deprecated);

    assert_eq!(
        log.borrow().last(),
        Some(&(IFACE, addr("fe80::1"), addr("2001:db8::42"), false))
    );
}

#[test]
fn test_renew_with_solicit_and_no_hint() {
    let (mut service, handle, _log) = bound("2001:db8::42");
    service.configure(IFACE, true, false, true);
    assert!(!service.session(handle).unwrap().server_duid().is_empty());

    let ticks = service.stack().next_timer().unwrap();
    let outcomes = sim::fire_timers(&mut service, ticks);
    assert_eq!(outcomes, vec![RenewalOutcome::Sent(Dhcp6MessageType::Solicit)]);

    let request = take_one(&mut service);
    let header = Dhcp6Header::parse(&request.message).unwrap();
    assert_eq!(header.message_type(), Some(Dhcp6MessageType::Solicit));
    assert!(header.server_id().is_none());
    let ia_na = header.ia_na().unwrap();
    assert!(ia_na.addresses.is_empty());
    assert_eq!((ia_na.t1, ia_na.t2), (0, 0));
}

#[test]
fn test_renew_names_server_and_address() {
    let (mut service, handle, _log) = bound("2001:db8::42");

    let outcomes = sim::fire_timers(&mut service, 9000);
    assert_eq!(outcomes, vec![RenewalOutcome::Sent(Dhcp6MessageType::Renew)]);

    let request = service.transport().pending()[0].clone();
    let header = Dhcp6Header::parse(&request.message).unwrap();
    assert_eq!(header.message_type(), Some(Dhcp6MessageType::Renew));
    assert_eq!(header.server_id(), Some(server_duid().as_view()));
    let ia_na = header.ia_na().unwrap();
    assert_eq!(ia_na.addresses[0].address, addr("2001:db8::42"));
    assert_eq!(ia_na.addresses[0].valid_lifetime, 3600);
    assert_eq!(request.destination, addr("fe80::1"));
    assert_eq!(service.session(handle).unwrap().transaction(), Some(request.transaction));
    assert_eq!(service.stats().renews_sent.get(), 1);
}

#[test]
fn test_renew_while_pending_is_refused() {
    let (mut service, _handle, _log) = bound("2001:db8::42");
    let address = addr("2001:db8::42");

    assert_eq!(
        service.on_address_event(IFACE, Some(address), AddressEventReason::Timer),
        RenewalOutcome::Sent(Dhcp6MessageType::Renew)
    );
    assert_eq!(
        service.on_address_event(IFACE, Some(address), AddressEventReason::Timer),
        RenewalOutcome::InProgress
    );
    assert_eq!(service.transport().pending().len(), 1);
}

#[test]
fn test_renew_send_failure_schedules_retry() {
    let (mut service, handle, _log) = bound("2001:db8::42");
    service.transport_mut().fail_next_send = true;

    let outcomes = sim::fire_timers(&mut service, 9000);
    assert_eq!(outcomes, vec![RenewalOutcome::RetryScheduled]);
    let entry = service.stack().address(IFACE, &addr("2001:db8::42")).unwrap();
    assert_eq!(entry.state_timer, RETRY_TICKS);
    assert!(service.session(handle).unwrap().transaction().is_none());
    assert_eq!(service.stats().send_failures.get(), 1);

    let outcomes = sim::fire_timers(&mut service, RETRY_TICKS);
    assert_eq!(outcomes, vec![RenewalOutcome::Sent(Dhcp6MessageType::Renew)]);
}

#[test]
fn test_invalidated_address_releases_session() {
    let (mut service, handle, _log) = bound("2001:db8::42");
    sim::fire_timers(&mut service, 9000);
    assert_eq!(service.transport().pending().len(), 1);

    let outcome = service.on_address_event(IFACE, Some(addr("2001:db8::42")), AddressEventReason::Invalidated);
    assert_eq!(outcome, RenewalOutcome::Released);
    assert!(service.session(handle).is_none());
    assert!(service.transport().pending().is_empty());
    assert_eq!(service.transport().cancelled(), &[handle]);

    assert_eq!(
        service.on_address_event(IFACE, Some(addr("2001:db8::42")), AddressEventReason::Timer),
        RenewalOutcome::Ignored
    );
}

#[test]
fn test_renew_goes_through_relay_when_it_has_a_global_address() {
    let (mut service, _handle, _log) = bound("2001:db8::42");
    service.enable_relay(IFACE, addr("fd00::1"));
    service.enable_relay_interface_id_option(IFACE, true);

    let relay = service.client(IFACE).unwrap().relay_channel().unwrap();
    let state = service.transport().channel(relay).unwrap();
    assert_eq!(state.role, ChannelRole::RelayAgent);
    assert_eq!(state.relay_server, Some(addr("fd00::1")));
    assert!(state.relay_interface_id);

    service
        .transport_mut()
        .set_relay_global_address(relay, Some(addr("2001:db8:ff::1")));
    sim::fire_timers(&mut service, 9000);
    assert_eq!(service.transport().pending()[0].destination, addr("2001:db8:ff::1"));
}

#[test]
fn test_delete_prefix_single_binding_deprecates() {
    let mut service = initialized();
    service.configure(IFACE, false, true, false);
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);
    deliver(&mut service, solicit.session, &Grant::new("2001:db8::42").reply_to(&solicit)).unwrap();
    sim::fire_timers(&mut service, 9000);
    assert_eq!(service.transport().pending().len(), 1);

    service.global_address_delete(IFACE, addr("2001:db8::")).unwrap();

    let entry = service.stack().address(IFACE, &addr("2001:db8::42")).unwrap();
    assert!(entry.deprecated);
    assert!(service.transport().pending().is_empty());
    assert!(service.sessions().is_empty());
}

#[test]
fn test_delete_prefix_multi_binding_removes() {
    let (mut service, handle, _log) = bound("2001:db8::42");

    service.global_address_delete(IFACE, addr("2001:db8::")).unwrap();
    assert!(service.stack().address(IFACE, &addr("2001:db8::42")).is_none());
    assert!(service.transport().cancelled().contains(&handle));

    let err = service.global_address_delete(IFACE, addr("2001:db8::")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_server_duid_buffer_only_grows() {
    let (mut service, handle, _log) = bound("2001:db8::42");
    assert_eq!(service.session(handle).unwrap().server_duid().capacity(), 8);

    let long = Duid::link_layer(LinkType::Eui64, &HardwareAddr([1, 2, 3, 4, 5, 6, 7, 8]));
    let short = Duid::link_layer(LinkType::Eui48, &HardwareAddr::from_mac([6, 5, 4, 3, 2, 1]));
    for (duid, capacity) in [(long.clone(), 10), (short, 10), (long, 10)] {
        let ticks = service.stack().next_timer().unwrap();
        sim::fire_timers(&mut service, ticks);
        let renew = take_one(&mut service);
        let mut grant = Grant::new("2001:db8::42");
        grant.server = duid.clone();
        deliver(&mut service, renew.session, &grant.reply_to(&renew)).unwrap();

        let stored = service.session(handle).unwrap().server_duid();
        assert_eq!(stored.capacity(), capacity);
        assert_eq!(stored.get(), Some(duid.as_view()));
    }
    assert_eq!(service.sessions().len(), 1);
}

#[test]
fn test_option_notifications() {
    let mut service = initialized();
    let seen: Rc<RefCell<Vec<(u16, Vec<u8>, u32)>>> = Rc::default();
    let sink = seen.clone();
    service
        .set_option_notify_callback(
            IFACE,
            Some(Box::new(
                move |_: InterfaceId, option: &OptionNotification<'_>, server: &ServerInfo<'_>| {
                    let data = match *option {
                        OptionNotification::VendorSpecific { data, .. }
                        | OptionNotification::VendorClass { data, .. } => data.to_vec(),
                        OptionNotification::DnsServers(data) | OptionNotification::DomainList(data) => {
                            data.to_vec()
                        }
                    };
                    assert_eq!(server.duid, &server_duid().data[..]);
                    sink.borrow_mut().push((option.option_type(), data, server.lifetime));
                },
            )),
        )
        .unwrap();
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);

    let grant = Grant::new("2001:db8::42")
        .option(options::DNS_SERVERS, vec![0x20; 15])
        .option(options::DNS_SERVERS, addr("2001:db8::53").octets().to_vec())
        .option(options::DNS_SERVERS, vec![0x20; 17])
        .option(options::VENDOR_OPTS, vec![0, 0, 1, 38, 0xAA])
        .option(options::VENDOR_OPTS, vec![0, 0, 1])
        .option(options::DOMAIN_LIST, b"\x04mesh\x00".to_vec());
    deliver(&mut service, solicit.session, &grant.reply_to(&solicit)).unwrap();

    let seen = seen.borrow();
    assert_eq!(
        seen.as_slice(),
        &[
            (options::DNS_SERVERS, addr("2001:db8::53").octets().to_vec(), 3600),
            (options::VENDOR_OPTS, vec![0xAA], 3600),
            (options::DOMAIN_LIST, b"\x04mesh\x00".to_vec(), 3600),
        ]
    );
    assert_eq!(service.stats().option_notifications.get(), 3);
}

#[test]
fn test_no_notifications_for_zero_lifetime() {
    let mut service = initialized();
    let count = Rc::new(RefCell::new(0));
    let sink = count.clone();
    service
        .set_option_notify_callback(
            IFACE,
            Some(Box::new(
                move |_: InterfaceId, _: &OptionNotification<'_>, _: &ServerInfo<'_>| {
                    *sink.borrow_mut() += 1;
                },
            )),
        )
        .unwrap();
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);
    let mut grant = Grant::new("2001:db8::42").option(options::DOMAIN_LIST, b"\x00".to_vec());
    grant.valid = 0;
    grant.preferred = 0;
    deliver(&mut service, solicit.session, &grant.reply_to(&solicit)).unwrap();

    assert_eq!(*count.borrow(), 0);
}

#[test]
fn test_initialize_twice_keeps_one_client() {
    let mut service = initialized();
    service.configure(IFACE, true, true, true);
    service.set_solicit_timing(IFACE, 5, 60, 3);
    let first = service.client(IFACE).unwrap();
    let (channel, instance) = (first.channel(), first.instance());

    service.initialize(IFACE, LinkType::Eui64).unwrap();
    assert_eq!(service.clients().len(), 1);
    let client = service.client(IFACE).unwrap();
    assert_eq!(client.channel(), channel);
    assert_ne!(client.instance(), instance);
    assert!(!client.renew_uses_solicit());
    assert!(!client.one_binding_per_interface());
    assert!(!client.retry_timing().is_configured());
}

#[test]
fn test_initialize_missing_interface_is_noop() {
    let mut service = service();
    service.initialize(9, LinkType::Eui64).unwrap();
    assert!(service.clients().is_empty());

    let err = service
        .request_global_address(9, addr("fe80::1"), None, None)
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(matches!(
        service.set_option_notify_callback(9, None),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_client_duid_from_hardware_address() {
    let service = initialized();
    let duid = service.client(IFACE).unwrap().duid();
    assert_eq!(duid.duid_type, 3);
    assert_eq!(duid.data, vec![0, 27, 0x02, 0, 0, 0xff, 0xfe, 0, 0, 0x03]);
}

#[test]
fn test_request_argument_errors() {
    let mut service = initialized();
    let err = service
        .request_global_address(IFACE, Ipv6Addr::UNSPECIFIED, None, None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));

    service
        .request_global_address(IFACE, addr("fe80::1"), None, None)
        .unwrap();
    let err = service
        .request_global_address(IFACE, addr("fe80::1"), None, None)
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyInProgress(_)));
    assert_eq!(service.transport().pending().len(), 1);
}

#[test]
fn test_request_without_channel() {
    let mut service = service();
    service.transport_mut().fail_next_open = true;
    service.initialize(IFACE, LinkType::Eui64).unwrap();
    assert!(service.client(IFACE).unwrap().channel().is_none());

    let err = service
        .request_global_address(IFACE, addr("fe80::1"), None, None)
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(service.sessions().is_empty());
}

#[test]
fn test_solicit_send_failure_frees_session() {
    let mut service = initialized();
    service.transport_mut().fail_next_send = true;
    let err = service
        .request_global_address(IFACE, addr("fe80::1"), Some(addr("2001:db8::")), None)
        .unwrap_err();
    assert!(matches!(err, Error::SendFailure(_)));
    assert!(service.sessions().is_empty());
    assert_eq!(service.stats().send_failures.get(), 1);
}

#[test]
fn test_solicit_timing_is_passed_to_transport() {
    let mut service = initialized();
    service.set_solicit_timing(IFACE, 2, 30, 4);
    request(&mut service, addr("fe80::1"), None);

    let retry = service.transport().pending()[0].retry.unwrap();
    assert_eq!((retry.timeout, retry.max_rt, retry.max_rc), (2, 30, 4));
}

#[test]
fn test_multi_binding_sessions_per_prefix() {
    let mut service = initialized();
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8:0:1::")));

    let pending = service.transport().pending();
    assert_eq!(pending.len(), 2);
    let iaids: Vec<u32> = pending
        .iter()
        .map(|r| Dhcp6Header::parse(&r.message).unwrap().ia_na().unwrap().iaid)
        .collect();
    assert_ne!(iaids[0], iaids[1]);
    assert_eq!(service.sessions().len(), 2);

    // same prefix again only redirects the outstanding request
    request(&mut service, addr("fe80::2"), Some(addr("2001:db8::")));
    assert_eq!(service.transport().pending().len(), 2);
    assert_eq!(service.transport().pending()[0].destination, addr("fe80::2"));
    assert_eq!(service.sessions().len(), 2);
}

#[test]
fn test_server_address_update() {
    let (mut service, handle, _log) = bound("2001:db8::42");
    service
        .server_address_update(IFACE, Some(addr("2001:db8::")), addr("fe80::9"))
        .unwrap();
    assert_eq!(service.session(handle).unwrap().server_address(), addr("fe80::9"));

    let err = service
        .server_address_update(IFACE, Some(addr("2001:db8:5::")), addr("fe80::9"))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    let err = service
        .server_address_update(IFACE, None, addr("fe80::9"))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_single_binding_rehomes_to_new_prefix() {
    let mut service = initialized();
    service.configure(IFACE, false, true, false);
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);
    deliver(&mut service, solicit.session, &Grant::new("2001:db8::42").reply_to(&solicit)).unwrap();

    // same /64: nothing to do
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    assert!(service.transport().pending().is_empty());

    request(&mut service, addr("fe80::2"), Some(addr("2001:db8:1::")));
    let resolicit = take_one(&mut service);
    assert_eq!(resolicit.session, solicit.session);
    assert_eq!(resolicit.destination, addr("fe80::2"));
    assert!(service.stack().address(IFACE, &addr("2001:db8::42")).unwrap().deprecated);

    let hint = Dhcp6Header::parse(&resolicit.message).unwrap().ia_na().unwrap();
    assert_eq!(hint.addresses[0].address, addr("2001:db8:1::"));

    deliver(&mut service, resolicit.session, &Grant::new("2001:db8:1::7").reply_to(&resolicit)).unwrap();
    let session = service.session(resolicit.session).unwrap();
    assert!(session.is_valid());
    assert_eq!(session.address(), addr("2001:db8:1::7"));
    assert!(!service.stack().address(IFACE, &addr("2001:db8:1::7")).unwrap().deprecated);
}

#[test]
fn test_omit_hint_sends_bare_ia_na() {
    let mut service = initialized();
    service.configure(IFACE, false, false, true);
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);
    let ia_na = Dhcp6Header::parse(&solicit.message).unwrap().ia_na().unwrap();
    assert!(ia_na.addresses.is_empty());
}

#[test]
fn test_delete_tears_down_client() {
    let (mut service, handle, _log) = bound("2001:db8::42");
    let channel = service.client(IFACE).unwrap().channel().unwrap();

    service.delete(IFACE);

    assert!(service.clients().contains(IFACE));
    assert!(service.client(IFACE).unwrap().channel().is_none());
    assert!(!service.transport().is_open(channel));
    assert!(service.session(handle).is_none());
    assert!(service.stack().addresses(IFACE).is_empty());

    service.initialize(IFACE, LinkType::Eui64).unwrap();
    let reopened = service.client(IFACE).unwrap().channel();
    assert!(reopened.is_some());
    assert_ne!(reopened, Some(channel));
}

#[test]
fn test_delete_after_interface_removed_releases_sessions() {
    let mut service = initialized();
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let solicit = take_one(&mut service);

    service.stack_mut().remove_interface(IFACE);
    service.delete(IFACE);

    assert!(!service.sessions().contains(solicit.session));
    assert!(service.sessions().is_empty());
    assert_eq!(service.transport().cancelled(), &[solicit.session]);

    service
        .stack_mut()
        .add_interface(IFACE, HardwareAddr([0x02, 0, 0, 0xff, 0xfe, 0, 0, 0x03]));
    service.initialize(IFACE, LinkType::Eui64).unwrap();
    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));

    let resolicit = take_one(&mut service);
    assert_ne!(resolicit.session, solicit.session);
    assert!(service.sessions().contains(resolicit.session));
    assert_eq!(service.stats().solicits_sent.get(), 2);
}

#[test]
fn test_address_renew_is_noop() {
    let (mut service, handle, _log) = bound("2001:db8::42");
    service.global_address_renew(IFACE);
    assert!(service.transport().pending().is_empty());
    assert!(service.session(handle).unwrap().transaction().is_none());
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<(InterfaceId, Ipv6Addr, BuildVariant)>>>);

impl BindingObserver for Recorder {
    fn address_bound(&mut self, interface: InterfaceId, address: Ipv6Addr, variant: BuildVariant) {
        self.0.borrow_mut().push((interface, address, variant));
    }
}

#[test]
fn test_full_exchange_with_responder() {
    let mut stack = MemoryStack::new();
    stack.add_interface(IFACE, HardwareAddr([0x02, 0, 0, 0xff, 0xfe, 0, 0, 0x03]));
    let config = ServiceConfig {
        variant: BuildVariant::Light,
        ..ServiceConfig::default()
    };
    let mut service = Dhcp6ClientService::new(config, LoopbackTransport::new(), stack);
    let recorder = Recorder::default();
    service.set_binding_observer(Box::new(recorder.clone()));
    service.initialize(IFACE, LinkType::Eui64).unwrap();
    let vendor: Rc<RefCell<Vec<(u32, Vec<u8>)>>> = Rc::default();
    let sink = vendor.clone();
    service
        .set_option_notify_callback(
            IFACE,
            Some(Box::new(
                move |_: InterfaceId, option: &OptionNotification<'_>, _: &ServerInfo<'_>| {
                    if let OptionNotification::VendorSpecific { enterprise_number, data } = *option {
                        sink.borrow_mut().push((enterprise_number, data.to_vec()));
                    }
                },
            )),
        )
        .unwrap();

    let mut responder = Responder::new(server_duid(), addr("2001:db8:ffff::"))
        .with_timers(300, 480)
        .with_lifetimes(1200, 2400)
        .with_dns_servers(vec![addr("2001:db8::53")])
        .with_vendor_data(294, vec![0xAA, 0xBB]);

    request(&mut service, addr("fe80::1"), Some(addr("2001:db8::")));
    let class = service.transport().pending()[0].message.clone();
    assert_eq!(
        Dhcp6Header::parse(&class).unwrap().vendor_class(),
        Some((294, &b"light"[..]))
    );
    assert_eq!(sim::run_exchange(&mut service, &mut responder).unwrap(), 1);

    let leased = addr("2001:db8::100");
    let entry = service.stack().address(IFACE, &leased).unwrap();
    assert_eq!((entry.preferred_lifetime, entry.valid_lifetime), (1200, 2400));
    assert_eq!(service.stack().next_timer(), Some(3000));

    let (_, session) = service.sessions().iter().next().unwrap();
    let client_duid = service.client(IFACE).unwrap().duid().to_bytes();
    assert_eq!(responder.lease(&client_duid, session.iaid()), Some(leased));

    let outcomes = sim::fire_timers(&mut service, 3000);
    assert_eq!(outcomes, vec![RenewalOutcome::Sent(Dhcp6MessageType::Renew)]);
    assert_eq!(sim::run_exchange(&mut service, &mut responder).unwrap(), 1);

    assert_eq!(service.stack().addresses(IFACE).len(), 1);
    assert_eq!(service.stats().replies_accepted.get(), 2);
    assert_eq!(
        vendor.borrow().as_slice(),
        &[(294, vec![0xAA, 0xBB]), (294, vec![0xAA, 0xBB])]
    );
    assert_eq!(
        recorder.0.borrow().as_slice(),
        &[
            (IFACE, leased, BuildVariant::Light),
            (IFACE, leased, BuildVariant::Light),
        ]
    );
}
