//! Monitor configuration: an optional TOML file, then command-line overrides.
//!
//! ```toml
//! url = "http://127.0.0.1:8080"
//! endpoint = "job_path"
//! jobs = ["fuzz-libpng-1"]
//!
//! [sync]
//! poll_interval_ms = 2000
//! display_window = 40
//! strategy = "per_series"
//!
//! [[charts]]
//! title = "Throughput"
//! unit = "execs/s"
//! series = [{ name = "Execs/sec", column = "execs_per_sec", color = "blue" }]
//! ```
//!
//! An empty `charts` list means the built-in Lagopus charts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lagopus_core::{ChartSpec, EndpointStyle, FetchStrategy, SyncSettings};

pub const DEFAULT_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("no jobs to monitor (pass --job or set `jobs` in the config file)")]
    NoJobs,
}

/// Everything needed to build the chart drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Base URL of the stats endpoint.
    pub url: String,
    pub endpoint: EndpointStyle,
    pub jobs: Vec<String>,
    pub sync: SyncSettings,
    pub charts: Vec<ChartSpec>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            endpoint: EndpointStyle::default(),
            jobs: Vec::new(),
            sync: SyncSettings::default(),
            charts: Vec::new(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub endpoint: Option<EndpointStyle>,
    pub jobs: Vec<String>,
    pub interval_ms: Option<u64>,
    pub window: Option<usize>,
    pub strategy: Option<FetchStrategy>,
}

impl MonitorConfig {
    pub fn from_toml(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &contents)
    }

    /// Load `path` (if any), apply `overrides` and validate.
    pub fn resolve(path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(overrides)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) -> Result<(), ConfigError> {
        if let Some(url) = &overrides.url {
            self.url = url.clone();
        }
        if let Some(endpoint) = overrides.endpoint {
            self.endpoint = endpoint;
        }
        if !overrides.jobs.is_empty() {
            self.jobs = overrides.jobs.clone();
        }
        if let Some(ms) = overrides.interval_ms {
            if ms == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "interval-ms".into(),
                    message: "poll interval must be positive".into(),
                });
            }
            self.sync = self.sync.poll_interval(Duration::from_millis(ms));
        }
        if let Some(window) = overrides.window {
            self.sync = self.sync.display_window(window);
        }
        if let Some(strategy) = overrides.strategy {
            self.sync = self.sync.strategy(strategy);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs.iter().all(|j| j.trim().is_empty()) {
            return Err(ConfigError::NoJobs);
        }
        if self.sync.display_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.display_window".into(),
                message: "must be at least 1".into(),
            });
        }
        for chart in &self.charts {
            if chart.series.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("charts.{}", chart.title),
                    message: "chart has no series".into(),
                });
            }
        }
        Ok(())
    }

    /// Configured charts, or the built-in set.
    pub fn chart_specs(&self) -> Vec<ChartSpec> {
        if self.charts.is_empty() {
            ChartSpec::lagopus_defaults()
        } else {
            self.charts.clone()
        }
    }
}
