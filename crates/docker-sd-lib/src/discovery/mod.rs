//! Scrape target discovery
//!
//! Turns a snapshot of containers into Prometheus scrape targets. The
//! resolver handles a single container; the extractor drives it over the
//! whole snapshot, counts diagnostics and orders the result.

mod extract;
mod ports;
mod resolver;

#[cfg(test)]
mod tests;

pub use extract::{extract_all, order_targets, Extraction, ExtractionCounters};
pub use ports::{find_lowest_tcp_private_port, match_scrape_port, resolve_port, PortResolution};
pub use resolver::{resolve, ResolverConfig};
