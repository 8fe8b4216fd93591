use crate::domain::Environment;
use crate::infra::DEFAULT_NOMAD_ADDRESS;
use dirs::home_dir;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = ".trek.rc";
pub const DEFAULT_ENVIRONMENT_NAME: &str = "default";

#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("invalid configuration in {path}: {source}")]
    Invalid {
        path: String,
        source: serde_json::Error,
    },
}

/// Clusters the navigator offers, plus where they came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrekConfig {
    pub environments: Vec<Environment>,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "Environments", default)]
    environments: Option<Vec<EnvironmentEntry>>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Address")]
    address: String,
}

/// Address used when no config file names a cluster: `NOMAD_ADDR` or localhost.
pub fn default_nomad_address() -> String {
    std::env::var("NOMAD_ADDR")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_NOMAD_ADDRESS.to_string())
}

pub fn default_environment(address: String) -> Environment {
    Environment {
        name: DEFAULT_ENVIRONMENT_NAME.to_string(),
        address,
    }
}

/// Candidate config files in lookup order: working directory, then home.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(home) = home_dir() {
        paths.push(home.join(CONFIG_FILE_NAME));
    }
    paths
}

pub fn load_config() -> Result<TrekConfig, LoadConfigError> {
    load_config_from(&config_search_paths(), default_nomad_address())
}

/// Loads the first existing file in `paths`; falls back to a single default cluster.
pub fn load_config_from(
    paths: &[PathBuf],
    fallback_address: String,
) -> Result<TrekConfig, LoadConfigError> {
    for path in paths {
        let Some(environments) = read_config_file(path)? else {
            continue;
        };
        if environments.is_empty() {
            break;
        }
        return Ok(TrekConfig {
            environments,
            source: Some(path.clone()),
        });
    }

    Ok(TrekConfig {
        environments: vec![default_environment(fallback_address)],
        source: None,
    })
}

fn read_config_file(path: &Path) -> Result<Option<Vec<Environment>>, LoadConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(LoadConfigError::Read {
                path: path.display().to_string(),
                source: error,
            });
        }
    };

    let file: ConfigFile =
        serde_json::from_str(&raw).map_err(|error| LoadConfigError::Invalid {
            path: path.display().to_string(),
            source: error,
        })?;

    Ok(Some(
        file.environments
            .unwrap_or_default()
            .into_iter()
            .map(|entry| Environment {
                name: entry.name,
                address: entry.address,
            })
            .collect(),
    ))
}
