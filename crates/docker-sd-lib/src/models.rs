//! Core data models for the discovery agent

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Label set attached to a scrape target. Ordered so that serialized output is stable.
pub type LabelSet = BTreeMap<String, String>;

/// Network ID -> labels derived from inspecting that network
pub type NetworkLabelMap = HashMap<String, LabelSet>;

/// Transport protocol of an exposed port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    Tcp,
    Udp,
    Sctp,
    Other,
}

/// A single exposed port entry as reported by the runtime.
///
/// The same private port shows up once per host binding, e.g. when it is
/// published on both the IPv4 and IPv6 wildcard address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedPort {
    pub port_type: PortType,
    pub private_port: u16,
    pub public_port: Option<u16>,
    pub public_ip: Option<String>,
}

impl ExposedPort {
    pub fn tcp(private_port: u16) -> Self {
        Self {
            port_type: PortType::Tcp,
            private_port,
            public_port: None,
            public_ip: None,
        }
    }

    pub fn is_tcp(&self) -> bool {
        self.port_type == PortType::Tcp
    }
}

/// A container's attachment to one network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub ip_address: String,
    pub network_id: String,
}

/// Point-in-time view of a container, immutable for one poll cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    pub id: String,
    /// Names as reported by the runtime; the first one is canonical
    pub names: Vec<String>,
    /// Raw container labels. Iterated in key order during rewriting.
    pub labels: BTreeMap<String, String>,
    /// Network name -> endpoint
    pub networks: HashMap<String, NetworkEndpoint>,
    pub ports: Vec<ExposedPort>,
    pub state: String,
    pub network_mode: String,
}

impl ContainerSnapshot {
    pub fn canonical_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }
}

/// Per-container outcome of resolution, exported or not
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub name: String,
    /// `host:port`, empty unless the target is exported
    pub address: String,
    pub labels: LabelSet,

    pub has_job: bool,
    pub is_in_target_network: bool,
    /// At least one TCP port (live or synthesized)
    pub has_tcp_ports: bool,
    /// Port was stated by the operator or was the only candidate
    pub has_explicit_port: bool,
    pub scrape_external: bool,
}

impl ResolvedTarget {
    pub fn is_exported(&self) -> bool {
        self.has_job && self.is_in_target_network && self.has_tcp_ports
    }
}
