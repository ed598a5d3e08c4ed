//! YAML alert definition loading
//!
//! Each file is a mapping from alert name to its settings:
//!
//! ```yaml
//! nightly-build-age:
//!   type: indexedTask
//!   description: Nightly build is stale
//!   namespace: gecko.v2.mozilla-central.nightly.latest
//!   threshold: 36
//!   frequency: 3600
//! ```

use std::path::{Path, PathBuf};

use super::alert::Alert;
use super::config::AlertConfig;
use super::error::ConfigurationError;
use crate::config::SourceConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("No alerts defined in {0}")]
    Empty(PathBuf),

    #[error("Alert '{name}' in {path}: {source}")]
    Configuration {
        path: PathBuf,
        name: String,
        #[source]
        source: ConfigurationError,
    },
}

/// Parse the alert definitions in one YAML file, in file order
///
/// The mapping key is the alert name and overrides any `name` in the body.
pub fn read_alert_configs(path: &Path) -> Result<Vec<AlertConfig>, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let yaml_error = |source| LoadError::Yaml {
        path: path.to_path_buf(),
        source,
    };

    let document: Option<serde_yaml::Mapping> = serde_yaml::from_str(&contents).map_err(yaml_error)?;
    let document = document.unwrap_or_default();
    if document.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }

    let mut configs = Vec::with_capacity(document.len());
    for (key, body) in document {
        let name: String = serde_yaml::from_value(key).map_err(yaml_error)?;
        let mut config: AlertConfig = serde_yaml::from_value(body).map_err(yaml_error)?;
        config.name = name;
        configs.push(config);
    }

    Ok(configs)
}

/// Build the alerts defined in one YAML file
pub fn load_alert_file(path: &Path, sources: &SourceConfig) -> Result<Vec<Alert>, LoadError> {
    read_alert_configs(path)?
        .into_iter()
        .map(|config| {
            let name = config.name.clone();
            Alert::from_config(sources, config).map_err(|source| LoadError::Configuration {
                path: path.to_path_buf(),
                name,
                source,
            })
        })
        .collect()
}

/// Build the alerts from a YAML file, or from every `*.yml`/`*.yaml` file in a directory
///
/// Directory entries are read in file name order.
pub fn load_alerts(path: &Path, sources: &SourceConfig) -> Result<Vec<Alert>, LoadError> {
    if path.is_file() {
        return load_alert_file(path, sources);
    }

    let io_error = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path).map_err(io_error)? {
        let file = entry.map_err(io_error)?.path();
        let is_yaml = matches!(
            file.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        if is_yaml && file.is_file() {
            files.push(file);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }

    let mut alerts = Vec::new();
    for file in &files {
        let loaded = load_alert_file(file, sources)?;
        tracing::info!(file = %file.display(), alerts = loaded.len(), "Loaded alert definitions");
        alerts.extend(loaded);
    }

    Ok(alerts)
}
