//! Configuration validation

use super::{Config, InterfaceConfig};
use crate::protocol::HardwareAddr;
use crate::telemetry::{LOG_FORMATS, LOG_LEVELS};
use std::collections::HashSet;
use std::net::Ipv6Addr;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_logging(config, &mut result);
    validate_interfaces(config, &mut result);

    result
}

fn validate_logging(config: &Config, result: &mut ValidationResult) {
    let Some(logging) = &config.logging else {
        return;
    };

    if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
        result.error(format!("logging.level: unknown level '{}'", logging.level));
    }
    if !LOG_FORMATS.contains(&logging.format.as_str()) {
        result.error(format!(
            "logging.format: unknown format '{}'",
            logging.format
        ));
    }
}

fn validate_interfaces(config: &Config, result: &mut ValidationResult) {
    if config.interfaces.is_empty() {
        result.warn("no [[interface]] entries defined");
    }

    let mut seen = HashSet::new();
    for iface in &config.interfaces {
        if !seen.insert(iface.id) {
            result.error(format!("interface {}: duplicate interface id", iface.id));
        }
        validate_addresses(iface, result);
        validate_timing(iface, result);
    }
}

fn parse_ipv6(
    iface: &InterfaceConfig,
    field: &str,
    value: Option<&str>,
    result: &mut ValidationResult,
) -> Option<Ipv6Addr> {
    let value = value?;
    match value.parse::<Ipv6Addr>() {
        Ok(addr) => Some(addr),
        Err(_) => {
            result.error(format!(
                "interface {}: {} '{}' is not an IPv6 address",
                iface.id, field, value
            ));
            None
        }
    }
}

fn validate_addresses(iface: &InterfaceConfig, result: &mut ValidationResult) {
    if let Some(hw) = &iface.hardware_address {
        if hw.parse::<HardwareAddr>().is_err() {
            result.error(format!(
                "interface {}: invalid hardware_address '{}'",
                iface.id, hw
            ));
        }
    }

    if let Some(server) = parse_ipv6(iface, "server", iface.server.as_deref(), result) {
        if server.is_unspecified() {
            result.error(format!(
                "interface {}: server must not be the unspecified address",
                iface.id
            ));
        }
    }

    if let Some(relay) = parse_ipv6(iface, "relay", iface.relay.as_deref(), result) {
        if relay.is_unspecified() || relay.is_multicast() {
            result.error(format!(
                "interface {}: relay '{}' must be a unicast address",
                iface.id, relay
            ));
        }
    }

    let prefix = parse_ipv6(iface, "prefix", iface.prefix.as_deref(), result);
    if prefix.is_some() && iface.omit_address_hint {
        result.warn(format!(
            "interface {}: omit_address_hint set, requested prefix is not sent to the server",
            iface.id
        ));
    }
}

fn validate_timing(iface: &InterfaceConfig, result: &mut ValidationResult) {
    let timeout = iface.solicit_timeout.unwrap_or(0);
    let max_rt = iface.solicit_max_rt.unwrap_or(0);
    let max_rc = iface.solicit_max_rc.unwrap_or(0);

    if timeout == 0 && (max_rt != 0 || max_rc != 0) {
        result.error(format!(
            "interface {}: solicit_max_rt/solicit_max_rc require solicit_timeout",
            iface.id
        ));
    }

    if max_rt != 0 && timeout > max_rt {
        result.warn(format!(
            "interface {}: solicit_timeout ({}) exceeds solicit_max_rt ({})",
            iface.id, timeout, max_rt
        ));
    }
}
