//! Observability infrastructure for the discovery agent
//!
//! Provides:
//! - Prometheus metrics (refresh attempts/errors, container diagnostics, refresh latency)
//! - Structured logging with tracing

use crate::discovery::ExtractionCounters;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{error, info};

/// Metric name prefix
pub const NAMESPACE: &str = "prometheus_docker_sd";

/// Labels carried by every metric
const LABEL_KEYS: &[&str] = &["external_url", "target_network"];

const REFRESH_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DiscoveryMetricsInner> = OnceLock::new();

struct DiscoveryMetricsInner {
    attempts: IntCounterVec,
    errors: IntCounterVec,
    refresh_duration_seconds: HistogramVec,
    containers: IntGaugeVec,
    ignored: IntGaugeVec,
    not_in_target_network: IntGaugeVec,
    no_exposed_ports: IntGaugeVec,
    multiple_ports_not_explicit: IntGaugeVec,
}

impl DiscoveryMetricsInner {
    fn new() -> Self {
        Self {
            attempts: register_int_counter_vec!(
                format!("{}_discovery_attempts_total", NAMESPACE),
                "Number of attempts to discover containers and write result",
                LABEL_KEYS
            )
            .expect("Failed to register discovery_attempts_total"),

            errors: register_int_counter_vec!(
                format!("{}_discovery_attempts_errors_total", NAMESPACE),
                "Number of attempts to discover containers and write result, that resulted in some error",
                LABEL_KEYS
            )
            .expect("Failed to register discovery_attempts_errors_total"),

            refresh_duration_seconds: register_histogram_vec!(
                format!("{}_refresh_duration_seconds", NAMESPACE),
                "Time spent on one discovery refresh",
                LABEL_KEYS,
                REFRESH_BUCKETS.to_vec()
            )
            .expect("Failed to register refresh_duration_seconds"),

            containers: register_int_gauge_vec!(
                format!("{}_containers_count", NAMESPACE),
                "Number of containers discovered",
                LABEL_KEYS
            )
            .expect("Failed to register containers_count"),

            ignored: register_int_gauge_vec!(
                format!("{}_containers_ignored_count", NAMESPACE),
                "Number of containers discovered that were ignored",
                LABEL_KEYS
            )
            .expect("Failed to register containers_ignored_count"),

            not_in_target_network: register_int_gauge_vec!(
                format!("{}_containers_not_in_target_network_count", NAMESPACE),
                "Number of containers discovered with the 'prometheus_job' label set, but not in the target network",
                LABEL_KEYS
            )
            .expect("Failed to register containers_not_in_target_network_count"),

            no_exposed_ports: register_int_gauge_vec!(
                format!("{}_containers_no_exposed_ports_count", NAMESPACE),
                "Number of containers discovered with the 'prometheus_job' label set, but with no exposed TCP ports",
                LABEL_KEYS
            )
            .expect("Failed to register containers_no_exposed_ports_count"),

            multiple_ports_not_explicit: register_int_gauge_vec!(
                format!("{}_containers_multiple_ports_not_explicit_count", NAMESPACE),
                "Number of containers discovered with the 'prometheus_job' label set, with multiple exposed TCP ports, but the prometheus_scrape_port is not defined",
                LABEL_KEYS
            )
            .expect("Failed to register containers_multiple_ports_not_explicit_count"),
        }
    }
}

/// Discovery metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance, bound to one
/// `external_url`/`target_network` label pair. Clones share the same
/// underlying metrics.
#[derive(Clone, Debug)]
pub struct DiscoveryMetrics {
    external_url: String,
    target_network: String,
}

impl DiscoveryMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new(external_url: impl Into<String>, target_network: impl Into<String>) -> Self {
        GLOBAL_METRICS.get_or_init(DiscoveryMetricsInner::new);
        let metrics = Self {
            external_url: external_url.into(),
            target_network: target_network.into(),
        };

        // Make the counters show up before the first refresh completes
        metrics.inner().attempts.with_label_values(&metrics.label_values());
        metrics.inner().errors.with_label_values(&metrics.label_values());
        metrics
    }

    fn inner(&self) -> &DiscoveryMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    fn label_values(&self) -> [&str; 2] {
        [self.external_url.as_str(), self.target_network.as_str()]
    }

    /// Count a refresh attempt
    pub fn inc_attempts(&self) {
        self.inner()
            .attempts
            .with_label_values(&self.label_values())
            .inc();
    }

    /// Count a failed refresh
    pub fn inc_errors(&self) {
        self.inner()
            .errors
            .with_label_values(&self.label_values())
            .inc();
    }

    /// Record how long a refresh took
    pub fn observe_refresh_duration(&self, duration_secs: f64) {
        self.inner()
            .refresh_duration_seconds
            .with_label_values(&self.label_values())
            .observe(duration_secs);
    }

    /// Publish the diagnostic counts of the latest extraction
    pub fn set_counters(&self, counters: &ExtractionCounters) {
        let labels = self.label_values();
        let inner = self.inner();

        inner
            .containers
            .with_label_values(&labels)
            .set(counters.total as i64);
        inner
            .ignored
            .with_label_values(&labels)
            .set(counters.without_job as i64);
        inner
            .not_in_target_network
            .with_label_values(&labels)
            .set(counters.not_in_target_network as i64);
        inner
            .no_exposed_ports
            .with_label_values(&labels)
            .set(counters.no_tcp_ports as i64);
        inner
            .multiple_ports_not_explicit
            .with_label_values(&labels)
            .set(counters.ambiguous_ports as i64);
    }

    #[cfg(test)]
    pub(crate) fn attempts(&self) -> u64 {
        self.inner()
            .attempts
            .with_label_values(&self.label_values())
            .get()
    }

    #[cfg(test)]
    pub(crate) fn errors(&self) -> u64 {
        self.inner()
            .errors
            .with_label_values(&self.label_values())
            .get()
    }
}

/// Structured logger for discovery events
#[derive(Clone, Debug)]
pub struct StructuredLogger {
    target_network: String,
    instance_prefix: String,
}

impl StructuredLogger {
    pub fn new(target_network: impl Into<String>, instance_prefix: impl Into<String>) -> Self {
        Self {
            target_network: target_network.into(),
            instance_prefix: instance_prefix.into(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, docker_host: &str, output_file: &str) {
        info!(
            event = "agent_started",
            target_network = %self.target_network,
            instance_prefix = %self.instance_prefix,
            version = %version,
            docker_host = %docker_host,
            output_file = %output_file,
            "Docker service discovery started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            target_network = %self.target_network,
            reason = %reason,
            "Docker service discovery shutting down"
        );
    }

    /// Log a completed refresh
    pub fn log_refresh(&self, counters: &ExtractionCounters, exported: usize, elapsed_ms: u128) {
        info!(
            event = "refresh_completed",
            target_network = %self.target_network,
            containers = counters.total,
            exported = exported,
            without_job = counters.without_job,
            not_in_target_network = counters.not_in_target_network,
            no_tcp_ports = counters.no_tcp_ports,
            ambiguous_ports = counters.ambiguous_ports,
            elapsed_ms = elapsed_ms,
            "Refresh complete"
        );
    }

    /// Log a failed refresh step
    pub fn log_refresh_failed(&self, stage: &str, error: &dyn std::fmt::Display) {
        error!(
            event = "refresh_failed",
            target_network = %self.target_network,
            stage = %stage,
            error = %error,
            "Refresh failed, waiting for next tick"
        );
    }
}
