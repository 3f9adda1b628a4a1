//! File-based service discovery output
//!
//! Writes exported targets in the `file_sd_config` format Prometheus
//! watches: a list of `{targets: [...], labels: {...}}` groups.

use crate::models::{LabelSet, ResolvedTarget};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors writing the output file
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("unsupported file extension in output file {0:?}, expected .json, .yml or .yaml")]
    UnsupportedExtension(PathBuf),

    #[error("failed to marshal targets as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to marshal targets as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Serialization format of the output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl OutputFormat {
    /// Pick the format from the file extension (case insensitive)
    pub fn from_path(path: &Path) -> Result<Self, OutputError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => Ok(OutputFormat::Json),
            Some("yml") | Some("yaml") => Ok(OutputFormat::Yaml),
            _ => Err(OutputError::UnsupportedExtension(path.to_path_buf())),
        }
    }
}

/// One target group in file_sd format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSdGroup {
    pub targets: Vec<String>,
    pub labels: LabelSet,
}

/// Groups for the exported targets, in input order
pub fn to_file_sd(targets: &[ResolvedTarget]) -> Vec<FileSdGroup> {
    targets
        .iter()
        .filter(|t| t.is_exported())
        .map(|t| FileSdGroup {
            targets: vec![t.address.clone()],
            labels: t.labels.clone(),
        })
        .collect()
}

/// Serialize groups in the given format
pub fn render(groups: &[FileSdGroup], format: OutputFormat) -> Result<Vec<u8>, OutputError> {
    let data = match format {
        OutputFormat::Json => serde_json::to_vec(groups)?,
        OutputFormat::Yaml => serde_yaml::to_string(groups)?.into_bytes(),
    };
    Ok(data)
}

/// Write groups to `path`, replacing it atomically so Prometheus never
/// reads a partial file.
pub async fn write_file_sd(
    path: &Path,
    format: OutputFormat,
    groups: &[FileSdGroup],
) -> Result<(), OutputError> {
    let data = render(groups, format)?;
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    tokio::fs::write(&temp_path, &data).await.map_err(io_err)?;
    tokio::fs::rename(&temp_path, path).await.map_err(io_err)?;

    debug!(
        path = %path.display(),
        groups = groups.len(),
        bytes = data.len(),
        "Wrote file_sd output"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exported(name: &str, address: &str) -> ResolvedTarget {
        ResolvedTarget {
            name: name.to_string(),
            address: address.to_string(),
            labels: LabelSet::from([
                ("job".to_string(), "job1".to_string()),
                ("__address__".to_string(), address.to_string()),
            ]),
            has_job: true,
            is_in_target_network: true,
            has_tcp_ports: true,
            has_explicit_port: true,
            scrape_external: false,
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            OutputFormat::from_path(Path::new("docker_sd.yml")).unwrap(),
            OutputFormat::Yaml
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("/etc/prom/sd.YAML")).unwrap(),
            OutputFormat::Yaml
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("sd.json")).unwrap(),
            OutputFormat::Json
        );
        assert!(matches!(
            OutputFormat::from_path(Path::new("sd.txt")),
            Err(OutputError::UnsupportedExtension(_))
        ));
        assert!(OutputFormat::from_path(Path::new("sd")).is_err());
    }

    #[test]
    fn test_only_exported_targets() {
        let not_exported = ResolvedTarget {
            name: "/idle".to_string(),
            ..Default::default()
        };
        let groups = to_file_sd(&[not_exported, exported("/app1", "ip1:2000")]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].targets, vec!["ip1:2000".to_string()]);
        assert_eq!(groups[0].labels["job"], "job1");
    }

    #[test]
    fn test_render_json() {
        let groups = to_file_sd(&[exported("/app1", "ip1:2000")]);
        let data = render(&groups, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();

        assert_eq!(value[0]["targets"][0], "ip1:2000");
        assert_eq!(value[0]["labels"]["job"], "job1");
    }

    #[test]
    fn test_render_empty_json_is_array() {
        let data = render(&[], OutputFormat::Json).unwrap();
        assert_eq!(data, b"[]");
    }

    #[tokio::test]
    async fn test_write_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("docker_sd.yml");
        let groups = to_file_sd(&[exported("/app1", "ip1:2000")]);

        write_file_sd(&path, OutputFormat::Yaml, &groups)
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: Vec<FileSdGroup> = serde_yaml::from_str(&content).unwrap();
        assert_eq!(parsed, groups);
        assert!(!temp_dir.path().join("nested").join("docker_sd.yml.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_replaces_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docker_sd.json");

        let first = to_file_sd(&[exported("/app1", "ip1:2000"), exported("/app2", "ip2:2000")]);
        write_file_sd(&path, OutputFormat::Json, &first).await.unwrap();

        write_file_sd(&path, OutputFormat::Json, &[]).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "[]");
    }
}
