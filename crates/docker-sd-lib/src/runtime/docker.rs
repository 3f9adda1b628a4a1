//! Docker Engine API runtime

use super::{async_trait, ContainerRuntime, RuntimeError};
use crate::labels::{meta, sanitize_label_name};
use crate::models::{
    ContainerSnapshot, ExposedPort, LabelSet, NetworkEndpoint, NetworkLabelMap, PortType,
};
use bollard::container::ListContainersOptions;
use bollard::models::{ContainerSummary, Network, Port, PortTypeEnum};
use bollard::network::ListNetworksOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Container runtime backed by a Docker daemon
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the daemon at `host`, e.g. `unix:///var/run/docker.sock`.
    ///
    /// `https://` hosts need `cert_path`, a directory holding `key.pem`,
    /// `cert.pem` and `ca.pem`. `timeout` bounds every request; it is
    /// rounded down to whole seconds with a minimum of one.
    pub fn connect(
        host: &str,
        timeout: Duration,
        cert_path: Option<&Path>,
    ) -> Result<Self, RuntimeError> {
        let url = Url::parse(host).map_err(|source| RuntimeError::InvalidHost {
            host: host.to_string(),
            source,
        })?;
        let timeout_secs = timeout.as_secs().max(1);

        let docker = match url.scheme() {
            "unix" => Docker::connect_with_socket(url.path(), timeout_secs, API_DEFAULT_VERSION),
            "http" | "tcp" => Docker::connect_with_http(host, timeout_secs, API_DEFAULT_VERSION),
            "https" => {
                let certs =
                    cert_path.ok_or_else(|| RuntimeError::MissingCertPath(host.to_string()))?;
                Docker::connect_with_ssl(
                    host,
                    &certs.join("key.pem"),
                    &certs.join("cert.pem"),
                    &certs.join("ca.pem"),
                    timeout_secs,
                    API_DEFAULT_VERSION,
                )
            }
            _ => return Err(RuntimeError::UnsupportedHost(host.to_string())),
        }
        .map_err(RuntimeError::Connect)?;

        info!(host = %host, timeout_secs = timeout_secs, "Docker client configured");
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSnapshot>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(RuntimeError::ListContainers)?;

        debug!(count = summaries.len(), "Listed containers");
        Ok(summaries.into_iter().map(container_snapshot).collect())
    }

    async fn network_labels(&self) -> Result<NetworkLabelMap, RuntimeError> {
        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await
            .map_err(RuntimeError::ListNetworks)?;

        debug!(count = networks.len(), "Listed networks");
        Ok(network_labels_from(networks))
    }
}

/// Convert a container summary from the list endpoint
pub fn container_snapshot(summary: ContainerSummary) -> ContainerSnapshot {
    let networks = summary
        .network_settings
        .and_then(|settings| settings.networks)
        .unwrap_or_default()
        .into_iter()
        .map(|(name, endpoint)| {
            (
                name,
                NetworkEndpoint {
                    ip_address: endpoint.ip_address.unwrap_or_default(),
                    network_id: endpoint.network_id.unwrap_or_default(),
                },
            )
        })
        .collect();

    ContainerSnapshot {
        id: summary.id.unwrap_or_default(),
        names: summary.names.unwrap_or_default(),
        labels: summary.labels.unwrap_or_default().into_iter().collect(),
        networks,
        ports: summary
            .ports
            .unwrap_or_default()
            .into_iter()
            .map(exposed_port)
            .collect(),
        state: summary.state.unwrap_or_default(),
        network_mode: summary
            .host_config
            .and_then(|host_config| host_config.network_mode)
            .unwrap_or_default(),
    }
}

fn exposed_port(port: Port) -> ExposedPort {
    let port_type = match port.typ {
        Some(PortTypeEnum::TCP) => PortType::Tcp,
        Some(PortTypeEnum::UDP) => PortType::Udp,
        Some(PortTypeEnum::SCTP) => PortType::Sctp,
        _ => PortType::Other,
    };

    ExposedPort {
        port_type,
        private_port: port.private_port,
        public_port: port.public_port,
        public_ip: port.ip,
    }
}

/// Derive `__meta_docker_network_*` labels for every network
pub fn network_labels_from(networks: Vec<Network>) -> NetworkLabelMap {
    networks
        .into_iter()
        .filter_map(|network| {
            let id = network.id?;

            let mut labels = LabelSet::from([
                (meta::NETWORK_ID.to_string(), id.clone()),
                (
                    meta::NETWORK_NAME.to_string(),
                    network.name.unwrap_or_default(),
                ),
                (
                    meta::NETWORK_SCOPE.to_string(),
                    network.scope.unwrap_or_default(),
                ),
                (
                    meta::NETWORK_INTERNAL.to_string(),
                    network.internal.unwrap_or(false).to_string(),
                ),
                (
                    meta::NETWORK_INGRESS.to_string(),
                    network.ingress.unwrap_or(false).to_string(),
                ),
            ]);

            for (key, value) in network.labels.unwrap_or_default() {
                labels.insert(
                    format!("{}{}", meta::NETWORK_LABEL_PREFIX, sanitize_label_name(&key)),
                    value,
                );
            }

            Some((id, labels))
        })
        .collect()
}
