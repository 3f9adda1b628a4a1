//! Label vocabulary
//!
//! Container label keys that drive discovery, and the label names written
//! to the file_sd output.

/// Prefix for every container label that is exported as a target label
pub const EXTRACT_LABEL_PREFIX: &str = "prometheus_";
/// Qualification label; its value becomes the `job` label
pub const JOB_LABEL: &str = "prometheus_job";

/// Prefix of the scrape control labels. These never reach the output verbatim.
pub const SCRAPE_PREFIX: &str = "prometheus_scrape_";
pub const SCRAPE_PORT: &str = "prometheus_scrape_port";
pub const SCRAPE_INTERVAL: &str = "prometheus_scrape_interval";
pub const SCRAPE_TIMEOUT: &str = "prometheus_scrape_timeout";
pub const SCRAPE_PATH: &str = "prometheus_scrape_path";
pub const SCRAPE_SCHEME: &str = "prometheus_scrape_scheme";
pub const SCRAPE_EXTERNAL: &str = "prometheus_scrape_external";

// Reserved Prometheus target labels
pub const ADDRESS_LABEL: &str = "__address__";
pub const INSTANCE_LABEL: &str = "instance";
pub const JOB_TARGET_LABEL: &str = "job";
pub const SCRAPE_INTERVAL_LABEL: &str = "__scrape_interval__";
pub const SCRAPE_TIMEOUT_LABEL: &str = "__scrape_timeout__";
pub const METRICS_PATH_LABEL: &str = "__metrics_path__";
pub const SCHEME_LABEL: &str = "__scheme__";

/// Docker meta labels
pub mod meta {
    pub const PREFIX: &str = "__meta_docker_";

    pub const CONTAINER_ID: &str = "__meta_docker_container_id";
    pub const CONTAINER_NAME: &str = "__meta_docker_container_name";
    pub const CONTAINER_STATE: &str = "__meta_docker_container_state";
    pub const CONTAINER_NETWORK_MODE: &str = "__meta_docker_container_network_mode";
    pub const CONTAINER_LABEL_PREFIX: &str = "__meta_docker_container_label_";

    pub const NETWORK_ID: &str = "__meta_docker_network_id";
    pub const NETWORK_NAME: &str = "__meta_docker_network_name";
    pub const NETWORK_SCOPE: &str = "__meta_docker_network_scope";
    pub const NETWORK_INTERNAL: &str = "__meta_docker_network_internal";
    pub const NETWORK_INGRESS: &str = "__meta_docker_network_ingress";
    pub const NETWORK_LABEL_PREFIX: &str = "__meta_docker_network_label_";
    pub const NETWORK_IP: &str = "__meta_docker_network_ip";

    pub const PORT_PRIVATE: &str = "__meta_docker_port_private";
    pub const PORT_PUBLIC: &str = "__meta_docker_port_public";
    pub const PORT_PUBLIC_IP: &str = "__meta_docker_port_public_ip";
}

/// Non-routable address used when a container has an explicit scrape port
/// but no IP (it is restarting). Keeps the file valid for Prometheus while
/// being easy to spot.
pub const PLACEHOLDER_IP: &str = "1.1.1.1";

/// Replace every character that is not valid in a Prometheus label name with `_`.
pub fn sanitize_label_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Join host and port, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
