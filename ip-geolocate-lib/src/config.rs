//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and the
//! environment, and merging configurations with proper precedence rules.

use crate::error::GeoEnrichError;
use crate::types::OutputOrder;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Default values for run parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Lookup service settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceConfig>,

    /// Output destination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// Default values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    /// Maximum lookups in flight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Per-request timeout (as string, e.g., "5s", "30s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// First row to read, 1-based
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_row: Option<usize>,

    /// Column letter holding the addresses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    /// "completion" or "input"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

/// Lookup service settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Output destination settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Configuration discovery and loading.
#[derive(Debug, Default)]
pub struct ConfigManager;

impl ConfigManager {
    pub fn new() -> Self {
        Self
    }

    /// Load and validate configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, GeoEnrichError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(GeoEnrichError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            GeoEnrichError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            GeoEnrichError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;
        debug!(path = %path.display(), "loaded configuration file");

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is lowest, then the home directory, then the working
    /// directory. Files that fail to load are skipped with a warning.
    pub fn discover_and_load(&self) -> Result<FileConfig, GeoEnrichError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring config file"),
            }
        }

        if loaded_files.len() > 1 {
            let files: Vec<String> = loaded_files
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            debug!(files = ?files, "merged multiple config files, last wins");
        }

        Ok(merged_config)
    }

    /// Config file in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./ip-geolocate.toml", "./.ip-geolocate.toml"];

        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Config file in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        let candidates = [".ip-geolocate.toml", "ip-geolocate.toml"];

        candidates
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Config file following the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("ip-geolocate").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations; values from `higher` win.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower_defaults), Some(higher_defaults)) => Some(DefaultsConfig {
                    concurrency: higher_defaults.concurrency.or(lower_defaults.concurrency),
                    timeout: higher_defaults.timeout.or(lower_defaults.timeout),
                    start_row: higher_defaults.start_row.or(lower_defaults.start_row),
                    column: higher_defaults.column.or(lower_defaults.column),
                    order: higher_defaults.order.or(lower_defaults.order),
                }),
                (lower_defaults, higher_defaults) => higher_defaults.or(lower_defaults),
            },
            service: match (lower.service, higher.service) {
                (Some(lower_service), Some(higher_service)) => Some(ServiceConfig {
                    base_url: higher_service.base_url.or(lower_service.base_url),
                    api_key: higher_service.api_key.or(lower_service.api_key),
                }),
                (lower_service, higher_service) => higher_service.or(lower_service),
            },
            output: match (lower.output, higher.output) {
                (Some(lower_output), Some(higher_output)) => Some(OutputConfig {
                    path: higher_output.path.or(lower_output.path),
                }),
                (lower_output, higher_output) => higher_output.or(lower_output),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), GeoEnrichError> {
        if let Some(defaults) = &config.defaults {
            if let Some(concurrency) = defaults.concurrency {
                if concurrency == 0 {
                    return Err(GeoEnrichError::config("Concurrency must be at least 1"));
                }
            }

            if let Some(timeout_str) = &defaults.timeout {
                if parse_timeout_string(timeout_str).is_none() {
                    return Err(GeoEnrichError::config(format!(
                        "Invalid timeout format '{}'. Use format like '5s', '30s', '2m'",
                        timeout_str
                    )));
                }
            }

            if defaults.start_row == Some(0) {
                return Err(GeoEnrichError::config("start_row is 1-based and must be at least 1"));
            }

            if let Some(column) = &defaults.column {
                crate::extractor::column_index(column)?;
            }

            if let Some(order) = &defaults.order {
                order
                    .parse::<OutputOrder>()
                    .map_err(GeoEnrichError::config)?;
            }
        }

        if let Some(service) = &config.service {
            if let Some(base_url) = &service.base_url {
                if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                    return Err(GeoEnrichError::config(format!(
                        "Service base_url '{}' must start with http:// or https://",
                        base_url
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via IPGEO_* variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout: Option<String>,
    pub base_url: Option<String>,
    pub output: Option<String>,
    pub order: Option<OutputOrder>,
    pub config: Option<String>,
}

/// Load configuration from IPGEO_* environment variables.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|key| env::var(key).ok())
}

/// Build an `EnvConfig` from any key lookup.
pub fn env_config_from<F>(var: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();
    let non_empty = |key: &str| var(key).filter(|value| !value.trim().is_empty());

    // IPGEO_API_KEY - service access token
    env_config.api_key = non_empty("IPGEO_API_KEY");

    // IPGEO_CONCURRENCY - lookups in flight
    if let Some(val) = non_empty("IPGEO_CONCURRENCY") {
        match val.trim().parse::<usize>() {
            Ok(concurrency) if concurrency > 0 => {
                debug!(concurrency, "using IPGEO_CONCURRENCY");
                env_config.concurrency = Some(concurrency);
            }
            _ => warn!(value = %val, "invalid IPGEO_CONCURRENCY, must be at least 1"),
        }
    }

    // IPGEO_TIMEOUT - per-request timeout
    if let Some(timeout_str) = non_empty("IPGEO_TIMEOUT") {
        if parse_timeout_string(&timeout_str).is_some() {
            debug!(timeout = %timeout_str, "using IPGEO_TIMEOUT");
            env_config.timeout = Some(timeout_str);
        } else {
            warn!(value = %timeout_str, "invalid IPGEO_TIMEOUT, use format like '5s', '30s', '2m'");
        }
    }

    // IPGEO_BASE_URL - service root
    env_config.base_url = non_empty("IPGEO_BASE_URL");

    // IPGEO_OUTPUT - output path
    env_config.output = non_empty("IPGEO_OUTPUT");

    // IPGEO_ORDER - completion | input
    if let Some(val) = non_empty("IPGEO_ORDER") {
        match val.parse::<OutputOrder>() {
            Ok(order) => env_config.order = Some(order),
            Err(e) => warn!(value = %val, "invalid IPGEO_ORDER: {}", e),
        }
    }

    // IPGEO_CONFIG - explicit config file
    env_config.config = non_empty("IPGEO_CONFIG");

    env_config
}

/// Parse a timeout string like "5s", "30s", "2m" into seconds.
///
/// Bare numbers are seconds. Zero is rejected.
pub fn parse_timeout_string(timeout_str: &str) -> Option<u64> {
    let timeout_str = timeout_str.trim().to_lowercase();

    let secs = if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.parse::<u64>().ok()
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.parse::<u64>().ok().and_then(|m| m.checked_mul(60))
    } else {
        timeout_str.parse::<u64>().ok()
    };

    secs.filter(|&s| s > 0)
}
