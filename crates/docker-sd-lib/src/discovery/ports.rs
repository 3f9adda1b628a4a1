//! Scrape port selection

use crate::models::ExposedPort;
use std::collections::BTreeSet;

/// Outcome of choosing the port a container is scraped on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortResolution {
    /// No TCP port to scrape
    NoPorts,
    /// The runtime reported no ports at all, but the operator named one.
    /// Happens while a container is restarting.
    SyntheticExplicit { port: u16 },
    /// The explicit scrape port matched a live TCP port
    SelectedExplicitMatch(ExposedPort),
    /// Lowest distinct TCP private port. `candidates` counts distinct private
    /// ports, not host bindings.
    SelectedLowest {
        entry: ExposedPort,
        candidates: usize,
    },
}

impl PortResolution {
    /// The port entry the target is built from, if any
    pub fn entry(&self) -> Option<ExposedPort> {
        match self {
            PortResolution::NoPorts => None,
            PortResolution::SyntheticExplicit { port } => Some(ExposedPort::tcp(*port)),
            PortResolution::SelectedExplicitMatch(entry) => Some(entry.clone()),
            PortResolution::SelectedLowest { entry, .. } => Some(entry.clone()),
        }
    }

    /// Whether the chosen port is unambiguous: stated by the operator (matched
    /// or not) or the only candidate.
    pub fn is_explicit(&self, explicit: Option<u16>) -> bool {
        match self {
            PortResolution::NoPorts => false,
            PortResolution::SyntheticExplicit { .. } => true,
            PortResolution::SelectedExplicitMatch(_) => true,
            PortResolution::SelectedLowest { candidates, .. } => {
                *candidates == 1 || explicit.is_some()
            }
        }
    }
}

/// Select the scrape port for a container's port table.
pub fn resolve_port(ports: &[ExposedPort], explicit: Option<u16>) -> PortResolution {
    if ports.is_empty() {
        return match explicit {
            Some(port) => PortResolution::SyntheticExplicit { port },
            None => PortResolution::NoPorts,
        };
    }

    if let Some(entry) = explicit.and_then(|port| match_scrape_port(ports, port)) {
        return PortResolution::SelectedExplicitMatch(entry.clone());
    }

    match find_lowest_tcp_private_port(ports) {
        Some((entry, candidates)) => PortResolution::SelectedLowest {
            entry: entry.clone(),
            candidates,
        },
        None => PortResolution::NoPorts,
    }
}

/// First TCP entry whose private port equals `port`
pub fn match_scrape_port(ports: &[ExposedPort], port: u16) -> Option<&ExposedPort> {
    ports
        .iter()
        .find(|p| p.is_tcp() && p.private_port == port)
}

/// Lowest TCP private port and the number of distinct TCP private ports
pub fn find_lowest_tcp_private_port(ports: &[ExposedPort]) -> Option<(&ExposedPort, usize)> {
    let distinct: BTreeSet<u16> = ports
        .iter()
        .filter(|p| p.is_tcp())
        .map(|p| p.private_port)
        .collect();

    ports
        .iter()
        .filter(|p| p.is_tcp())
        .min_by_key(|p| p.private_port)
        .map(|entry| (entry, distinct.len()))
}
