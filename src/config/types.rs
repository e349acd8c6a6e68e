//! Configuration types

use crate::protocol::{InterfaceId, LinkType};
use crate::telemetry::LogConfig;
use serde::{Deserialize, Serialize};

/// Default IANA enterprise number carried in the Vendor Class option
pub const DEFAULT_ENTERPRISE_NUMBER: u32 = 294;

/// User-defined configuration (config.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub logging: Option<LogConfig>,
    #[serde(default, rename = "interface")]
    pub interfaces: Vec<InterfaceConfig>,
}

/// Device role advertised to the server in the Vendor Class option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum BuildVariant {
    #[default]
    #[serde(rename = "br")]
    BorderRouter,
    #[serde(rename = "fsr")]
    Fsr,
    #[serde(rename = "light")]
    Light,
}

impl BuildVariant {
    /// Vendor-class identifier string
    pub fn vendor_class(self) -> &'static str {
        match self {
            BuildVariant::BorderRouter => "br",
            BuildVariant::Fsr => "fsr",
            BuildVariant::Light => "light",
        }
    }
}

/// Settings shared by every client of the service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub variant: BuildVariant,
    #[serde(default = "default_enterprise_number")]
    pub enterprise_number: u32,
}

fn default_enterprise_number() -> u32 {
    DEFAULT_ENTERPRISE_NUMBER
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            variant: BuildVariant::default(),
            enterprise_number: DEFAULT_ENTERPRISE_NUMBER,
        }
    }
}

/// Per-interface client settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceConfig {
    pub id: InterfaceId,
    #[serde(default)]
    pub link_type: LinkType,
    /// Hardware address used by `simulate`; derived from the id if absent
    pub hardware_address: Option<String>,
    #[serde(default)]
    pub renew_uses_solicit: bool,
    #[serde(default)]
    pub one_binding_per_interface: bool,
    #[serde(default)]
    pub omit_address_hint: bool,
    pub solicit_timeout: Option<u16>,
    pub solicit_max_rt: Option<u16>,
    pub solicit_max_rc: Option<u8>,
    pub relay: Option<String>,
    #[serde(default)]
    pub relay_interface_id: bool,
    pub server: Option<String>,
    pub prefix: Option<String>,
}

// ============================================================================
// Lock file types (generated, includes all defaults)
// ============================================================================

/// Generated lock file with all defaults filled in
#[derive(Debug, Clone, Serialize)]
pub struct ConfigLock {
    pub generated_at: String,
    pub service: ServiceLock,
    pub logging: LogLock,
    pub interface: Vec<InterfaceLock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceLock {
    pub variant: BuildVariant,
    pub vendor_class: String,
    pub enterprise_number: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogLock {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceLock {
    pub id: InterfaceId,
    pub link_type: LinkType,
    pub hardware_address: String,
    pub renew_uses_solicit: bool,
    pub one_binding_per_interface: bool,
    pub omit_address_hint: bool,
    pub solicit_timeout: u16,
    pub solicit_max_rt: u16,
    pub solicit_max_rc: u8,
    pub relay: String,
    pub relay_interface_id: bool,
    pub server: String,
    pub prefix: String,
}

impl InterfaceConfig {
    /// Hardware address string, or one derived from the interface id
    pub fn hardware_address_or_default(&self) -> String {
        self.hardware_address.clone().unwrap_or_else(|| {
            let [hi, lo] = self.id.to_be_bytes();
            format!("02:00:00:ff:fe:00:{:02x}:{:02x}", hi, lo)
        })
    }
}

impl ConfigLock {
    pub fn from_config(config: &Config) -> Self {
        let logging = config.logging.clone().unwrap_or_else(LogConfig::new);

        let interface = config
            .interfaces
            .iter()
            .map(|iface| InterfaceLock {
                id: iface.id,
                link_type: iface.link_type,
                hardware_address: iface.hardware_address_or_default(),
                renew_uses_solicit: iface.renew_uses_solicit,
                one_binding_per_interface: iface.one_binding_per_interface,
                omit_address_hint: iface.omit_address_hint,
                solicit_timeout: iface.solicit_timeout.unwrap_or(0),
                solicit_max_rt: iface.solicit_max_rt.unwrap_or(0),
                solicit_max_rc: iface.solicit_max_rc.unwrap_or(0),
                relay: iface.relay.clone().unwrap_or_default(),
                relay_interface_id: iface.relay_interface_id,
                server: iface.server.clone().unwrap_or_else(|| "ff02::1:2".to_string()),
                prefix: iface.prefix.clone().unwrap_or_default(),
            })
            .collect();

        ConfigLock {
            generated_at: chrono::Utc::now().to_rfc3339(),
            service: ServiceLock {
                variant: config.service.variant,
                vendor_class: config.service.variant.vendor_class().to_string(),
                enterprise_number: config.service.enterprise_number,
            },
            logging: LogLock {
                level: logging.level,
                format: logging.format,
            },
            interface,
        }
    }
}
