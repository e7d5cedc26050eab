use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::{parse_duration, Args};
use crate::poller::PollerConfig;

/// Longest history window accepted for rates and peaks
pub const MAX_RANGE: Duration = Duration::from_secs(365 * 86_400);

/// Settings read from the configuration file.
///
/// Durations use the same `<n>[ms|s|m|h|d]` syntax as the command line.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub poll: PollConfig,
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub address: Option<String>, // host:port or URL; discovered in-cluster when unset
    pub timeout: String,         // Per-request HTTP timeout
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollConfig {
    pub interval: String,
    pub range: String,
    pub step: String,
    pub batch_timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub namespace: String,
    pub service: String,
    pub port_name: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: None,
            timeout: "5s".to_string(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: "2s".to_string(),
            range: "1h".to_string(),
            step: "15s".to_string(),
            batch_timeout: "10s".to_string(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            namespace: "monitoring".to_string(),
            service: "prometheus-k8s".to_string(),
            port_name: "web".to_string(),
        }
    }
}

impl Config {
    /// Get the configuration file path
    pub fn config_file_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "clustertop", "clustertop")
            .context("Unable to determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load configuration from `path`, using defaults when it is missing or invalid
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        match toml::from_str::<Config>(&content) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Failed to parse config file {} ({}). Using defaults.", path.display(), e);
                eprintln!("⚠️  Warning: Failed to parse config file ({e}). Using defaults.");
                Ok(Self::default())
            }
        }
    }

    /// Render the configuration, or one section of it, as TOML
    pub fn to_toml(&self, section: Option<&str>) -> Result<String> {
        let content = match section {
            None => toml::to_string_pretty(self),
            Some("backend") => toml::to_string_pretty(&self.backend),
            Some("poll") => toml::to_string_pretty(&self.poll),
            Some("discovery") => toml::to_string_pretty(&self.discovery),
            Some(other) => {
                return Err(anyhow!(
                    "Unknown configuration section '{}'. Available: backend, poll, discovery",
                    other
                ))
            }
        };
        content.context("Failed to serialize config")
    }
}

/// Effective settings after merging the config file with command line flags
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub address: Option<String>,
    pub request_timeout: Duration,
    pub poller: PollerConfig,
    pub discovery: DiscoveryConfig,
}

impl Settings {
    /// Command line flags win over the configuration file
    pub fn resolve(config: &Config, args: &Args) -> Result<Self> {
        let address = args
            .address
            .clone()
            .or_else(|| config.backend.address.clone())
            .filter(|a| !a.trim().is_empty());

        let request_timeout = pick(args.timeout, &config.backend.timeout, "backend.timeout")?;
        let interval = pick(args.interval, &config.poll.interval, "poll.interval")?;
        let range = pick(args.range, &config.poll.range, "poll.range")?;
        let step = pick(args.step, &config.poll.step, "poll.step")?;
        let batch_timeout = pick(None, &config.poll.batch_timeout, "poll.batch_timeout")?;

        if range > MAX_RANGE {
            return Err(anyhow!(
                "Query range {:?} exceeds the maximum of {:?}",
                range,
                MAX_RANGE
            ));
        }
        if step > range {
            return Err(anyhow!(
                "Step {:?} is larger than the query range {:?}",
                step,
                range
            ));
        }

        Ok(Self {
            address,
            request_timeout,
            poller: PollerConfig {
                interval,
                range,
                step,
                timeout: Some(batch_timeout),
            },
            discovery: config.discovery.clone(),
        })
    }
}

fn pick(flag: Option<Duration>, configured: &str, key: &str) -> Result<Duration> {
    match flag {
        Some(value) => Ok(value),
        None => parse_duration(configured).map_err(|e| anyhow!("Invalid value for {}: {}", key, e)),
    }
}
