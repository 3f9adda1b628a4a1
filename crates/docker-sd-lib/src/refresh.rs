//! Discovery refresh loop
//!
//! Periodically lists containers, resolves them into scrape targets, writes
//! the file_sd output and publishes the result to metrics, health and the
//! status board. One cycle runs at a time; a failed cycle waits for the next
//! tick. A component that keeps failing is reported unhealthy.

use crate::discovery::{extract_all, Extraction, ResolverConfig};
use crate::health::{components, HealthRegistry};
use crate::observability::{DiscoveryMetrics, StructuredLogger};
use crate::output::{to_file_sd, write_file_sd, OutputFormat};
use crate::runtime::ContainerRuntime;
use crate::status::{StatusBoard, StatusView};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the refresh loop
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between refreshes (default: 60 seconds)
    pub interval: Duration,
    /// file_sd output path
    pub output_path: PathBuf,
    pub output_format: OutputFormat,
    pub resolver: ResolverConfig,
    /// Consecutive failed cycles before a component is unhealthy (default: 3)
    pub unhealthy_after: u32,
}

/// Refresh loop driving one container runtime
pub struct RefreshLoop {
    runtime: Arc<dyn ContainerRuntime>,
    config: RefreshConfig,
    metrics: DiscoveryMetrics,
    health: HealthRegistry,
    status: StatusBoard,
    logger: StructuredLogger,
    consecutive_failures: AtomicU32,
}

impl RefreshLoop {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        config: RefreshConfig,
        metrics: DiscoveryMetrics,
        health: HealthRegistry,
        status: StatusBoard,
    ) -> Self {
        let logger = StructuredLogger::new(
            config.resolver.target_network.clone(),
            config.resolver.instance_prefix.clone(),
        );

        Self {
            runtime,
            config,
            metrics,
            health,
            status,
            logger,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Run until a shutdown signal arrives. The first refresh happens immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            output = %self.config.output_path.display(),
            "Starting refresh loop"
        );

        let mut ticker = interval(self.config.interval);
        // A slow cycle must not cause a burst of catch-up refreshes
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Errors are already logged and counted
                    let _ = self.refresh_once().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down refresh loop");
                    break;
                }
            }
        }
    }

    /// Run a single refresh cycle
    pub async fn refresh_once(&self) -> Result<Extraction> {
        self.metrics.inc_attempts();
        let start = Instant::now();
        debug!("Begin refresh");

        let extraction = match self.discover().await {
            Ok(extraction) => extraction,
            Err(e) => {
                self.fail(components::DOCKER, "discover", &e).await;
                return Err(e);
            }
        };

        let groups = to_file_sd(&extraction.targets);
        let written = write_file_sd(
            &self.config.output_path,
            self.config.output_format,
            &groups,
        )
        .await
        .context("Failed to write results");
        if let Err(e) = written {
            self.fail(components::WRITER, "write", &e).await;
            return Err(e);
        }

        self.metrics.set_counters(&extraction.counters);
        self.status
            .publish(StatusView::from_targets(&extraction.targets));
        self.health.record_refresh().await;
        self.consecutive_failures.store(0, Ordering::Relaxed);

        let elapsed = start.elapsed();
        self.metrics.observe_refresh_duration(elapsed.as_secs_f64());
        self.logger
            .log_refresh(&extraction.counters, groups.len(), elapsed.as_millis());

        Ok(extraction)
    }

    async fn discover(&self) -> Result<Extraction> {
        let containers = self
            .runtime
            .list_containers()
            .await
            .context("Failed to refresh containers")?;
        let network_labels = self
            .runtime
            .network_labels()
            .await
            .context("Failed to refresh containers")?;

        Ok(extract_all(
            &containers,
            &self.config.resolver,
            &network_labels,
        ))
    }

    async fn fail(&self, component: &str, stage: &str, error: &anyhow::Error) {
        self.metrics.inc_errors();
        let message = format!("{:#}", error);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;

        if failures >= self.config.unhealthy_after {
            warn!(
                component = %component,
                consecutive_failures = failures,
                "Component unhealthy after repeated refresh failures"
            );
            self.health.set_unhealthy(component, message.clone()).await;
        } else {
            self.health.set_degraded(component, message.clone()).await;
        }
        self.logger.log_refresh_failed(stage, &message);
    }
}

/// Builder for creating the refresh loop
pub struct RefreshLoopBuilder {
    runtime: Option<Arc<dyn ContainerRuntime>>,
    interval: Duration,
    unhealthy_after: u32,
    output_path: Option<PathBuf>,
    resolver: Option<ResolverConfig>,
    metrics: Option<DiscoveryMetrics>,
    health: HealthRegistry,
    status: StatusBoard,
}

impl RefreshLoopBuilder {
    pub fn new() -> Self {
        Self {
            runtime: None,
            interval: Duration::from_secs(60),
            unhealthy_after: 3,
            output_path: None,
            resolver: None,
            metrics: None,
            health: HealthRegistry::default(),
            status: StatusBoard::new(),
        }
    }

    pub fn runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Consecutive failures before the failing component turns unhealthy
    pub fn unhealthy_after(mut self, failures: u32) -> Self {
        self.unhealthy_after = failures.max(1);
        self
    }

    /// Output file; its extension selects JSON or YAML
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn metrics(mut self, metrics: DiscoveryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn status(mut self, status: StatusBoard) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Result<RefreshLoop> {
        let runtime = self
            .runtime
            .ok_or_else(|| anyhow::anyhow!("Runtime is required"))?;
        let output_path = self
            .output_path
            .ok_or_else(|| anyhow::anyhow!("Output path is required"))?;
        let resolver = self
            .resolver
            .ok_or_else(|| anyhow::anyhow!("Resolver config is required"))?;
        if self.interval.is_zero() {
            anyhow::bail!("Refresh interval must be positive");
        }

        let output_format = OutputFormat::from_path(&output_path)?;
        let metrics = self
            .metrics
            .unwrap_or_else(|| DiscoveryMetrics::new("", resolver.target_network.clone()));

        Ok(RefreshLoop::new(
            runtime,
            RefreshConfig {
                interval: self.interval,
                output_path,
                output_format,
                resolver,
                unhealthy_after: self.unhealthy_after,
            },
            metrics,
            self.health,
            self.status,
        ))
    }
}

impl Default for RefreshLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
