//! Prometheus service discovery for containers on a single Docker host
//!
//! This crate provides the core functionality for:
//! - Resolving container metadata into one scrape target per container
//! - Reading container and network state from the Docker Engine API
//! - Writing file-based service discovery output
//! - Status view, health checks and observability

pub mod discovery;
pub mod health;
pub mod labels;
pub mod models;
pub mod observability;
pub mod output;
pub mod refresh;
pub mod runtime;
pub mod status;

pub use discovery::{extract_all, resolve, Extraction, ExtractionCounters, ResolverConfig};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DiscoveryMetrics, StructuredLogger};
pub use refresh::{RefreshConfig, RefreshLoop, RefreshLoopBuilder};
pub use runtime::{ContainerRuntime, DockerRuntime, RuntimeError};
pub use status::{StatusBoard, StatusView};
