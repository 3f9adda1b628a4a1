//! Container runtime access
//!
//! The discovery core only sees [`ContainerSnapshot`]s and a
//! [`NetworkLabelMap`]; this module is the seam to the runtime that produces
//! them.

mod docker;

pub use docker::{container_snapshot, network_labels_from, DockerRuntime};

use crate::models::{ContainerSnapshot, NetworkLabelMap};
use thiserror::Error;

pub use async_trait::async_trait;

/// Errors talking to the container runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unsupported docker host {0:?}, expected unix://, http://, https:// or tcp://")]
    UnsupportedHost(String),

    #[error("docker host {0:?} uses https but no certificate directory is configured")]
    MissingCertPath(String),

    #[error("invalid docker host {host:?}: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("error setting up docker client: {0}")]
    Connect(#[source] bollard::errors::Error),

    #[error("error while listing containers: {0}")]
    ListContainers(#[source] bollard::errors::Error),

    #[error("error while computing network labels: {0}")]
    ListNetworks(#[source] bollard::errors::Error),
}

/// Source of container and network state
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// All containers on the host, running or not
    async fn list_containers(&self) -> Result<Vec<ContainerSnapshot>, RuntimeError>;

    /// Labels derived from every network, keyed by network ID
    async fn network_labels(&self) -> Result<NetworkLabelMap, RuntimeError>;
}
