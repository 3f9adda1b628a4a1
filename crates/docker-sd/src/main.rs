//! Prometheus Docker SD - file-based service discovery agent
//!
//! Runs next to a Docker daemon, turns labelled containers into
//! file_sd_config targets and serves a status page plus metrics.

use anyhow::Result;
use clap::Parser;
use docker_sd::{
    api,
    config::{AgentConfig, Cli},
};
use docker_sd_lib::{
    DiscoveryMetrics, DockerRuntime, HealthRegistry, RefreshLoopBuilder, StatusBoard,
    StructuredLogger,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(config: &AgentConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AgentConfig::load(&cli)?;

    init_tracing(&config);

    let logger = StructuredLogger::new(&config.target_network_name, &config.instance_prefix);
    logger.log_startup(
        AGENT_VERSION,
        &config.docker_host,
        &config.output_file.display().to_string(),
    );

    let runtime = Arc::new(DockerRuntime::connect(
        &config.docker_host,
        config.refresh_interval(),
        config.docker_cert_path.as_deref(),
    )?);

    let health_registry = HealthRegistry::with_components().await;
    let metrics = DiscoveryMetrics::new(&config.external_url, &config.target_network_name);
    let status = StatusBoard::new();

    let refresh_loop = RefreshLoopBuilder::new()
        .runtime(runtime)
        .interval(config.refresh_interval())
        .output_path(config.output_file.clone())
        .resolver(config.resolver())
        .metrics(metrics)
        .health(health_registry.clone())
        .status(status.clone())
        .build()?;

    let app_state = Arc::new(api::AppState::new(health_registry, status));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let refresh_handle = tokio::spawn(refresh_loop.run(shutdown_rx));
    let api_handle = tokio::spawn(api::serve(config.http_address.clone(), app_state));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
                Ok(Ok(())) => {}
            }
            logger.log_shutdown("API server stopped");
        }
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = refresh_handle.await {
        error!(error = %e, "Refresh loop task panicked");
    }

    info!("Shutting down");
    Ok(())
}
