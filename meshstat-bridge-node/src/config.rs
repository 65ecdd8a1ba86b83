//! Configuration for the node bridge.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use meshstat_bridge_framework::{
    BridgeConfig, BridgeError, LoggingConfig, Result, SinksConfig,
};

use crate::neighbour::AddressFamily;

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeBridgeConfig {
    /// Node collection settings.
    #[serde(default)]
    pub node: NodeConfig,

    /// Sink settings.
    #[serde(default)]
    pub sinks: SinksConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local node collection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Hostname inserted into Graphite paths.
    /// Use "auto" to detect automatically (default).
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Poll interval in seconds (default: 60).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Root of the proc filesystem (default: "/proc").
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,

    /// Which sources to read.
    #[serde(default)]
    pub collect: CollectConfig,

    /// Network device renaming and filtering.
    #[serde(default)]
    pub devices: DeviceConfig,

    /// Neighbour table sampling.
    #[serde(default)]
    pub neighbour: NeighbourConfig,

    /// fastd status sockets.
    #[serde(default)]
    pub fastd: FastdConfig,
}

fn default_hostname() -> String {
    "auto".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            poll_interval_secs: default_poll_interval(),
            proc_root: default_proc_root(),
            collect: CollectConfig::default(),
            devices: DeviceConfig::default(),
            neighbour: NeighbourConfig::default(),
            fastd: FastdConfig::default(),
        }
    }
}

/// Configuration for which sources to collect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Interface counters from `net/dev`.
    #[serde(default = "default_true")]
    pub net_dev: bool,

    /// Load averages from `loadavg`.
    #[serde(default = "default_true")]
    pub loadavg: bool,

    /// IPv4 protocol counters from `net/snmp`.
    #[serde(default = "default_true")]
    pub snmp: bool,

    /// IPv6 protocol counters from `net/snmp6`.
    #[serde(default = "default_true")]
    pub snmp6: bool,

    /// Context switches from `stat`.
    #[serde(default = "default_true")]
    pub stat: bool,

    /// Conntrack table usage.
    #[serde(default = "default_true")]
    pub conntrack: bool,

    /// Neighbour table state counts.
    #[serde(default = "default_true")]
    pub neighbours: bool,

    /// fastd sockets and process drop counters.
    #[serde(default = "default_true")]
    pub fastd: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            net_dev: true,
            loadavg: true,
            snmp: true,
            snmp6: true,
            stat: true,
            conntrack: true,
            neighbours: true,
            fastd: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Network device renaming and allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Kernel device name to reported name.
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, String>,

    /// Reported names that are always included.
    #[serde(default = "default_allow")]
    pub allow: Vec<String>,

    /// Name suffixes that are included.
    #[serde(default = "default_allow_suffixes")]
    pub allow_suffixes: Vec<String>,
}

fn default_aliases() -> BTreeMap<String, String> {
    [
        ("freifunk", "ffda-br"),
        ("bat0", "ffda-bat"),
        ("mesh-vpn", "ffda-vpn"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_allow() -> Vec<String> {
    [
        "eth0",
        "ffda-vpn",
        "ffda-vpn-1280",
        "ffda-vpn-1312",
        "ffda-bat",
        "ffda-br",
        "ffda-transport",
        "services",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_allow_suffixes() -> Vec<String> {
    ["-vpn", "-bat", "-br", "-transport"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            aliases: default_aliases(),
            allow: default_allow(),
            allow_suffixes: default_allow_suffixes(),
        }
    }
}

impl DeviceConfig {
    /// Translate a kernel device name through the alias table.
    pub fn translate<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Check if a (translated) device name should be reported.
    pub fn should_include(&self, name: &str) -> bool {
        self.allow.iter().any(|a| a == name)
            || self.allow_suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }
}

/// Neighbour table sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighbourConfig {
    /// `ip` binary (default: "/bin/ip").
    #[serde(default = "default_ip_command")]
    pub command: PathBuf,

    /// Address families to sample: "inet", "inet6".
    #[serde(default = "default_families")]
    pub families: Vec<String>,

    /// Command timeout in seconds (default: 2).
    #[serde(default = "default_neighbour_timeout")]
    pub timeout_secs: u64,
}

fn default_ip_command() -> PathBuf {
    PathBuf::from("/bin/ip")
}

fn default_families() -> Vec<String> {
    vec!["inet".to_string(), "inet6".to_string()]
}

fn default_neighbour_timeout() -> u64 {
    2
}

impl Default for NeighbourConfig {
    fn default() -> Self {
        Self {
            command: default_ip_command(),
            families: default_families(),
            timeout_secs: default_neighbour_timeout(),
        }
    }
}

/// One fastd instance status socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastdSocket {
    /// Instance name used in metric keys (`fastd.<name>.…`).
    pub name: String,
    /// Path of the Unix status socket.
    pub path: PathBuf,
}

/// fastd configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastdConfig {
    /// Status sockets to query; missing sockets are skipped.
    #[serde(default = "default_fastd_sockets")]
    pub sockets: Vec<FastdSocket>,

    /// Socket read timeout in seconds (default: 1).
    #[serde(default = "default_fastd_timeout")]
    pub timeout_secs: u64,

    /// Process name whose UDP drop counters are summed (default: "fastd").
    #[serde(default = "default_process_name")]
    pub process_name: String,
}

fn default_fastd_sockets() -> Vec<FastdSocket> {
    vec![
        FastdSocket {
            name: "0".to_string(),
            path: PathBuf::from("/run/fastd-ffda-vpn.sock"),
        },
        FastdSocket {
            name: "1".to_string(),
            path: PathBuf::from("/run/fastd-ffda-vpn1.sock"),
        },
    ]
}

fn default_fastd_timeout() -> u64 {
    1
}

fn default_process_name() -> String {
    "fastd".to_string()
}

impl Default for FastdConfig {
    fn default() -> Self {
        Self {
            sockets: default_fastd_sockets(),
            timeout_secs: default_fastd_timeout(),
            process_name: default_process_name(),
        }
    }
}

impl NeighbourConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl FastdConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BridgeConfig for NodeBridgeConfig {
    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn sinks(&self) -> &SinksConfig {
        &self.sinks
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.node.poll_interval_secs)
    }

    fn source(&self) -> Option<&str> {
        Some(&self.node.hostname)
    }

    fn validate(&self) -> Result<()> {
        if self.node.hostname.is_empty() {
            return Err(BridgeError::validation("node.hostname must not be empty"));
        }

        for family in &self.node.neighbour.families {
            if AddressFamily::from_name(family).is_none() {
                return Err(BridgeError::validation(format!(
                    "Unknown address family '{}' (expected inet or inet6)",
                    family
                )));
            }
        }

        if self.node.neighbour.timeout_secs == 0 || self.node.fastd.timeout_secs == 0 {
            return Err(BridgeError::validation("timeouts must be > 0"));
        }

        let mut names: Vec<&str> = self.node.fastd.sockets.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.node.fastd.sockets.len() {
            return Err(BridgeError::validation("fastd socket names must be unique"));
        }

        Ok(())
    }
}
