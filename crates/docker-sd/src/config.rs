//! Agent configuration
//!
//! Precedence, lowest first: built-in defaults, optional config file,
//! `PROMETHEUS_DOCKER_SD_*` environment variables, command line flags.

use anyhow::{bail, Context, Result};
use clap::Parser;
use docker_sd_lib::output::OutputFormat;
use docker_sd_lib::ResolverConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Prometheus file-based service discovery for Docker containers
#[derive(Debug, Parser)]
#[command(name = "prometheus-docker-sd", version, about, long_about = None)]
pub struct Cli {
    /// Config file (TOML, YAML or JSON)
    #[arg(long, env = "PROMETHEUS_DOCKER_SD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output .json, .yml or .yaml file in file_sd_config format [default: docker_sd.yml]
    #[arg(long, env = "PROMETHEUS_DOCKER_SD_OUTPUT_FILE")]
    pub output_file: Option<PathBuf>,

    /// Docker host URL [default: unix:///var/run/docker.sock]
    #[arg(long, env = "PROMETHEUS_DOCKER_SD_DOCKER_HOST")]
    pub docker_host: Option<String>,

    /// Directory with key.pem, cert.pem and ca.pem, required for https:// Docker hosts
    #[arg(long, env = "PROMETHEUS_DOCKER_SD_DOCKER_CERT_PATH")]
    pub docker_cert_path: Option<PathBuf>,

    /// Network that containers must be a member of to be considered [default: metrics-net]
    #[arg(long, env = "PROMETHEUS_DOCKER_SD_TARGET_NETWORK_NAME")]
    pub target_network_name: Option<String>,

    /// Prefix added to the container name to form the 'instance' label. Required
    #[arg(long, env = "PROMETHEUS_DOCKER_SD_INSTANCE_PREFIX")]
    pub instance_prefix: Option<String>,

    /// Host used for external scrape targets [default: <instance-prefix>]
    #[arg(long, env = "PROMETHEUS_DOCKER_SD_EXTERNAL_HOST")]
    pub external_host: Option<String>,

    /// Time between queries to the Docker host, e.g. 30s or 1m [default: 60s]
    #[arg(
        long,
        env = "PROMETHEUS_DOCKER_SD_REFRESH_INTERVAL",
        value_parser = humantime::parse_duration
    )]
    pub refresh_interval: Option<Duration>,

    /// Address to serve metrics and the status page on [default: 0.0.0.0:9200]
    #[arg(long, env = "PROMETHEUS_DOCKER_SD_HTTP_ADDRESS")]
    pub http_address: Option<String>,

    /// External URL of this service, added as a metric label
    /// [default: http://<instance-prefix>:9200]
    #[arg(long, env = "PROMETHEUS_DOCKER_SD_EXTERNAL_URL")]
    pub external_url: Option<String>,

    /// Log level or tracing filter directive [default: info]
    #[arg(long, env = "PROMETHEUS_DOCKER_SD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log in JSON format
    #[arg(long, env = "PROMETHEUS_DOCKER_SD_LOG_JSON")]
    pub log_json: bool,
}

/// Effective agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub output_file: PathBuf,
    pub docker_host: String,
    #[serde(default)]
    pub docker_cert_path: Option<PathBuf>,
    pub target_network_name: String,
    pub instance_prefix: String,
    #[serde(default)]
    pub external_host: String,
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    pub http_address: String,
    #[serde(default)]
    pub external_url: String,
    pub log_level: String,
    pub log_json: bool,
}

impl AgentConfig {
    /// Load configuration from defaults, config file and command line
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("output_file", "docker_sd.yml")?
            .set_default("docker_host", "unix:///var/run/docker.sock")?
            .set_default("target_network_name", "metrics-net")?
            .set_default("instance_prefix", "")?
            .set_default("refresh_interval", "60s")?
            .set_default("http_address", "0.0.0.0:9200")?
            .set_default("log_level", "info")?
            .set_default("log_json", false)?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }

        let config = builder
            .add_source(config::Environment::with_prefix("PROMETHEUS_DOCKER_SD"))
            .set_override_option(
                "output_file",
                cli.output_file
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            )?
            .set_override_option("docker_host", cli.docker_host.clone())?
            .set_override_option(
                "docker_cert_path",
                cli.docker_cert_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            )?
            .set_override_option("target_network_name", cli.target_network_name.clone())?
            .set_override_option("instance_prefix", cli.instance_prefix.clone())?
            .set_override_option("external_host", cli.external_host.clone())?
            .set_override_option(
                "refresh_interval",
                cli.refresh_interval
                    .map(|d| humantime::format_duration(d).to_string()),
            )?
            .set_override_option("http_address", cli.http_address.clone())?
            .set_override_option("external_url", cli.external_url.clone())?
            .set_override_option("log_level", cli.log_level.clone())?
            .set_override_option("log_json", cli.log_json.then_some(true))?
            .build()
            .context("Failed to load configuration")?;

        let config: AgentConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validated()
    }

    /// Check required values and fill in derived defaults
    fn validated(mut self) -> Result<Self> {
        if self.target_network_name.trim().is_empty() {
            bail!("'target-network-name' required");
        }
        if self.instance_prefix.trim().is_empty() {
            bail!("'instance-prefix' required");
        }
        if self.refresh_interval.is_zero() {
            bail!("'refresh-interval' must be positive");
        }
        OutputFormat::from_path(&self.output_file)?;

        if self.external_host.is_empty() {
            self.external_host = self.instance_prefix.clone();
        }
        if self.external_url.is_empty() {
            self.external_url = format!("http://{}:9200", self.instance_prefix);
        }

        Ok(self)
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn resolver(&self) -> ResolverConfig {
        ResolverConfig {
            target_network: self.target_network_name.clone(),
            external_host: self.external_host.clone(),
            instance_prefix: self.instance_prefix.clone(),
        }
    }
}
