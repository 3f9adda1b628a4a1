//! Container to scrape target resolution
//!
//! Decides whether a container qualifies as a scrape target, rewrites its
//! labels and picks the address it is scraped on. Never fails: every anomaly
//! ends up as a diagnostic flag on the returned [`ResolvedTarget`].

use super::ports::{resolve_port, PortResolution};
use crate::labels::{self, meta, sanitize_label_name};
use crate::models::{
    ContainerSnapshot, LabelSet, NetworkEndpoint, NetworkLabelMap, ResolvedTarget,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Settings shared by every resolution in a poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Network a container must be attached to, unless scraped externally
    pub target_network: String,
    /// Host used for containers labelled for external scraping
    pub external_host: String,
    /// Prepended to the container name to form the `instance` label
    pub instance_prefix: String,
}

/// Values pulled out of the `prometheus_scrape_*` labels
#[derive(Debug, Default)]
struct ScrapeControls {
    port: Option<u16>,
    external: bool,
}

/// Resolve one container into a target record.
pub fn resolve(
    container: &ContainerSnapshot,
    config: &ResolverConfig,
    network_labels: &NetworkLabelMap,
) -> ResolvedTarget {
    let name = container.canonical_name().unwrap_or_default().to_string();

    let mut target = ResolvedTarget {
        labels: identity_labels(container, &name),
        name,
        ..Default::default()
    };

    if !container.labels.contains_key(labels::JOB_LABEL) {
        debug!(container_id = %container.id, name = %target.name, "No job label");
        return target;
    }
    target.has_job = true;

    let controls = rewrite_labels(&container.id, &container.labels, &mut target.labels);
    target.scrape_external = controls.external;

    let endpoint = match container.networks.get(&config.target_network) {
        Some(endpoint) => endpoint.clone(),
        None if controls.external => NetworkEndpoint::default(),
        None => {
            debug!(
                container_id = %container.id,
                name = %target.name,
                target_network = %config.target_network,
                networks = ?container.networks.keys().collect::<Vec<_>>(),
                "Not in target network and not scraped externally"
            );
            return target;
        }
    };
    target.is_in_target_network = true;

    let resolution = resolve_port(&container.ports, controls.port);

    let mut ip = endpoint.ip_address;
    if let PortResolution::SyntheticExplicit { port } = resolution {
        if ip.is_empty() {
            ip = labels::PLACEHOLDER_IP.to_string();
            info!(
                container_id = %container.id,
                name = %target.name,
                port = port,
                ip = %ip,
                "No ports or IP address found, using explicit port and placeholder IP"
            );
        }
    }
    target.labels.insert(meta::NETWORK_IP.to_string(), ip.clone());

    let Some(entry) = resolution.entry() else {
        debug!(
            container_id = %container.id,
            name = %target.name,
            ports = ?container.ports,
            "No TCP ports found"
        );
        return target;
    };
    target.has_tcp_ports = true;
    target.has_explicit_port = resolution.is_explicit(controls.port);

    target
        .labels
        .insert(meta::PORT_PRIVATE.to_string(), entry.private_port.to_string());
    if let Some(public_port) = entry.public_port.filter(|p| *p > 0) {
        target
            .labels
            .insert(meta::PORT_PUBLIC.to_string(), public_port.to_string());
        target.labels.insert(
            meta::PORT_PUBLIC_IP.to_string(),
            entry.public_ip.clone().unwrap_or_default(),
        );
    }

    // Network scoped labels take precedence over generic ones
    if let Some(derived) = network_labels.get(&endpoint.network_id) {
        target
            .labels
            .extend(derived.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    let port = controls.port.unwrap_or(entry.private_port).to_string();
    let host = if controls.external {
        config.external_host.as_str()
    } else {
        ip.as_str()
    };

    target.address = labels::join_host_port(host, &port);
    target
        .labels
        .insert(labels::ADDRESS_LABEL.to_string(), target.address.clone());
    target.labels.insert(
        labels::INSTANCE_LABEL.to_string(),
        format!("{}{}:{}", config.instance_prefix, target.name, port),
    );

    debug!(
        container_id = %container.id,
        name = %target.name,
        address = %target.address,
        explicit_port = target.has_explicit_port,
        "Resolved scrape target"
    );

    target
}

fn identity_labels(container: &ContainerSnapshot, name: &str) -> LabelSet {
    LabelSet::from([
        (meta::CONTAINER_ID.to_string(), container.id.clone()),
        (meta::CONTAINER_NAME.to_string(), name.to_string()),
        (meta::CONTAINER_STATE.to_string(), container.state.clone()),
        (
            meta::CONTAINER_NETWORK_MODE.to_string(),
            container.network_mode.clone(),
        ),
    ])
}

/// Rewrite raw container labels into `out` and collect the scrape controls.
///
/// Raw labels are visited in key order, so when two keys sanitize to the same
/// output name the lexicographically greater raw key wins.
fn rewrite_labels(
    container_id: &str,
    raw: &BTreeMap<String, String>,
    out: &mut LabelSet,
) -> ScrapeControls {
    let mut controls = ScrapeControls::default();

    for (key, value) in raw {
        let name = sanitize_label_name(key);

        if name.starts_with(labels::SCRAPE_PREFIX) {
            match name.as_str() {
                labels::SCRAPE_PORT => match value.trim().parse::<u16>() {
                    Ok(port) => controls.port = Some(port),
                    Err(_) => warn!(
                        container_id = %container_id,
                        value = %value,
                        "Ignoring invalid scrape port"
                    ),
                },
                labels::SCRAPE_INTERVAL => {
                    out.insert(labels::SCRAPE_INTERVAL_LABEL.to_string(), value.clone());
                }
                labels::SCRAPE_TIMEOUT => {
                    out.insert(labels::SCRAPE_TIMEOUT_LABEL.to_string(), value.clone());
                }
                labels::SCRAPE_PATH => {
                    out.insert(labels::METRICS_PATH_LABEL.to_string(), value.clone());
                }
                labels::SCRAPE_SCHEME => {
                    out.insert(labels::SCHEME_LABEL.to_string(), value.clone());
                }
                labels::SCRAPE_EXTERNAL => controls.external = value.eq_ignore_ascii_case("true"),
                _ => debug!(
                    container_id = %container_id,
                    label = %key,
                    "Unknown scrape control label"
                ),
            }
        } else if let Some(stripped) = name.strip_prefix(labels::EXTRACT_LABEL_PREFIX) {
            if stripped.is_empty() {
                continue;
            }
            out.insert(stripped.to_string(), value.clone());
        } else {
            out.insert(format!("{}{}", meta::CONTAINER_LABEL_PREFIX, name), value.clone());
        }
    }

    controls
}
