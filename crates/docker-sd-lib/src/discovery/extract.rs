//! Batch extraction over a full container snapshot

use super::resolver::{resolve, ResolverConfig};
use crate::models::{ContainerSnapshot, NetworkLabelMap, ResolvedTarget};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::debug;

/// Diagnostic counts for one extraction pass.
///
/// Each container lands in at most one bucket, checked in field order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionCounters {
    /// Records produced
    pub total: usize,
    /// No `prometheus_job` label
    pub without_job: usize,
    /// Job label set, but not attached to the target network
    pub not_in_target_network: usize,
    /// In the network, but no usable TCP port
    pub no_tcp_ports: usize,
    /// Exported on the lowest of several ports without an explicit port label
    pub ambiguous_ports: usize,
}

impl ExtractionCounters {
    fn record(&mut self, target: &ResolvedTarget) {
        self.total += 1;

        if !target.has_job {
            self.without_job += 1;
        } else if !target.is_in_target_network {
            self.not_in_target_network += 1;
        } else if !target.has_tcp_ports {
            self.no_tcp_ports += 1;
        } else if !target.has_explicit_port {
            self.ambiguous_ports += 1;
        }
    }
}

/// Result of a batch pass: ordered records plus counters
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub targets: Vec<ResolvedTarget>,
    pub counters: ExtractionCounters,
}

/// Resolve every named container and order the result for presentation.
pub fn extract_all(
    containers: &[ContainerSnapshot],
    config: &ResolverConfig,
    network_labels: &NetworkLabelMap,
) -> Extraction {
    let mut extraction = Extraction::default();

    for container in containers {
        if container.canonical_name().is_none() {
            debug!(container_id = %container.id, "Skipping container without a name");
            continue;
        }

        let target = resolve(container, config, network_labels);
        extraction.counters.record(&target);
        extraction.targets.push(target);
    }

    order_targets(&mut extraction.targets);
    extraction
}

/// Not exported first, then exported; each group by ascending name.
pub fn order_targets(targets: &mut [ResolvedTarget]) {
    targets.sort_by(compare_targets);
}

fn compare_targets(a: &ResolvedTarget, b: &ResolvedTarget) -> Ordering {
    a.is_exported()
        .cmp(&b.is_exported())
        .then_with(|| a.name.cmp(&b.name))
}
