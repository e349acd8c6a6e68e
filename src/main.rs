use clap::{Parser, Subcommand};
use dhcp6c::client::{
    BindingObserver, Dhcp6ClientService, OptionNotification, RenewalOutcome, ServerInfo,
};
use dhcp6c::config::{self, BuildVariant, Config, InterfaceConfig};
use dhcp6c::protocol::dhcpv6::{Duid, ALL_DHCP_SERVERS};
use dhcp6c::protocol::{HardwareAddr, InterfaceId, LinkType};
use dhcp6c::sim::{self, LoopbackTransport, MemoryStack, Responder, SimService};
use dhcp6c::telemetry::init_logging;
use std::net::Ipv6Addr;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dhcp6c")]
#[command(about = "DHCPv6 client for IPv6 mesh interfaces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run the configured interfaces against an in-memory server
    Simulate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Number of timer-driven renewals to run after the first binding
        #[arg(short, long, default_value_t = 1)]
        renewals: u32,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate config.lock from config.toml
    Generate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Output path for config.lock
        #[arg(short, long, default_value = "config.lock")]
        output: PathBuf,
    },
    /// Validate config.toml without generating lock file
    Validate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { action } => {
            init_logging(None);
            match action {
                ConfigAction::Generate { config, output } => cmd_config_generate(&config, &output),
                ConfigAction::Validate { config } => cmd_config_validate(&config),
            }
        }
        Commands::Simulate { config, renewals } => cmd_simulate(&config, renewals),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn load_validated(config_path: &PathBuf) -> Result<Config, String> {
    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        return Err("Validation failed with errors".to_string());
    }
    Ok(cfg)
}

fn cmd_config_generate(config_path: &PathBuf, output_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Loading {}...", config_path.display());

    let cfg = load_validated(config_path)?;
    let lock = config::generate_lock(&cfg);
    let lock_toml = config::render_lock(&lock).map_err(|e| e.to_string())?;

    let output = format!(
        "# Generated by dhcp6c - DO NOT EDIT\n# Source: {}\n\n{}",
        config_path.display(),
        lock_toml
    );

    std::fs::write(output_path, output).map_err(|e| format!("Failed to write lock file: {}", e))?;

    println!("[INFO] Generated {}", output_path.display());
    Ok(())
}

fn cmd_config_validate(config_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    load_validated(config_path)?;
    println!("[INFO] Configuration is valid");
    Ok(())
}

/// Logs each bound address the way a side notifier would announce it
struct LogObserver;

impl BindingObserver for LogObserver {
    fn address_bound(&mut self, interface: InterfaceId, address: Ipv6Addr, variant: BuildVariant) {
        info!(interface, %address, vendor_class = variant.vendor_class(), "address bound");
    }
}

fn parse_addr(value: &Option<String>) -> Result<Option<Ipv6Addr>, String> {
    value
        .as_deref()
        .map(|s| s.parse().map_err(|_| format!("Invalid IPv6 address: {}", s)))
        .transpose()
}

fn start_interface(service: &mut SimService, iface: &InterfaceConfig) -> Result<(), String> {
    let id = iface.id;
    service.initialize(id, iface.link_type).map_err(|e| e.to_string())?;
    service.configure(
        id,
        iface.renew_uses_solicit,
        iface.one_binding_per_interface,
        iface.omit_address_hint,
    );
    service.set_solicit_timing(
        id,
        iface.solicit_timeout.unwrap_or(0),
        iface.solicit_max_rt.unwrap_or(0),
        iface.solicit_max_rc.unwrap_or(0),
    );
    if let Some(relay) = parse_addr(&iface.relay)? {
        service.enable_relay(id, relay);
        service.enable_relay_interface_id_option(id, iface.relay_interface_id);
    }
    service
        .set_option_notify_callback(
            id,
            Some(Box::new(
                |interface: InterfaceId, option: &OptionNotification<'_>, server: &ServerInfo<'_>| {
                    info!(
                        interface,
                        option = option.option_type(),
                        server_duid_type = server.duid_type,
                        lifetime = server.lifetime,
                        "server option"
                    );
                },
            )),
        )
        .map_err(|e| e.to_string())?;

    let server = parse_addr(&iface.server)?.unwrap_or(ALL_DHCP_SERVERS);
    let prefix = parse_addr(&iface.prefix)?;
    service
        .request_global_address(
            id,
            server,
            prefix,
            Some(Box::new(
                |interface: InterfaceId, server: Ipv6Addr, address: Ipv6Addr, success: bool| {
                    if success {
                        info!(interface, %server, %address, "global address ready");
                    } else {
                        warn!(interface, %server, %address, "global address request failed");
                    }
                },
            )),
        )
        .map_err(|e| e.to_string())
}

fn cmd_simulate(config_path: &PathBuf, renewals: u32) -> Result<(), String> {
    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;
    init_logging(cfg.logging.as_ref());

    let validation = config::validate(&cfg);
    validation.print_diagnostics();
    if validation.has_errors() {
        return Err("Validation failed with errors".to_string());
    }

    let mut stack = MemoryStack::new();
    for iface in &cfg.interfaces {
        let hw: HardwareAddr = iface
            .hardware_address_or_default()
            .parse()
            .map_err(|e| format!("interface {}: {}", iface.id, e))?;
        stack.add_interface(iface.id, hw);
    }

    let mut service = Dhcp6ClientService::new(cfg.service.clone(), LoopbackTransport::new(), stack);
    service.set_binding_observer(Box::new(LogObserver));

    let server_duid = Duid::link_layer(LinkType::Eui48, &HardwareAddr::from_mac([0x02, 0, 0, 0, 0, 0x01]));
    let pool: Ipv6Addr = "2001:db8:ffff::".parse().map_err(|_| "bad pool prefix".to_string())?;
    let mut responder = Responder::new(server_duid, pool).with_timers(300, 480);

    for iface in &cfg.interfaces {
        if let Err(e) = start_interface(&mut service, iface) {
            warn!(interface = iface.id, "{}", e);
        }
    }

    let bound = sim::run_exchange(&mut service, &mut responder).map_err(|e| e.to_string())?;
    info!(bound, "initial exchange complete");

    for round in 1..=renewals {
        let Some(ticks) = service.stack().next_timer() else {
            info!("no renewal timer armed");
            break;
        };
        let outcomes = sim::fire_timers(&mut service, ticks);
        let sent = outcomes
            .iter()
            .filter(|o| matches!(o, RenewalOutcome::Sent(_)))
            .count();
        let accepted = sim::run_exchange(&mut service, &mut responder).map_err(|e| e.to_string())?;
        info!(round, ticks, sent, accepted, "renewal round complete");
    }

    for iface in &cfg.interfaces {
        for entry in service.stack().addresses(iface.id) {
            println!(
                "interface {}: {}/{} valid={} preferred={}{}",
                iface.id,
                entry.address,
                entry.prefix_len,
                entry.valid_lifetime,
                entry.preferred_lifetime,
                if entry.deprecated { " deprecated" } else { "" }
            );
        }
    }
    for (name, value) in service.stats().export() {
        println!("{} {}", name, value);
    }

    for iface in &cfg.interfaces {
        service.delete(iface.id);
    }
    Ok(())
}
