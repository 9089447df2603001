//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Shared primitives and utilities for the robot lifecycle runtime."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Upper bound on manifests returned by a robot detail read.
pub const MANIFEST_HISTORY_CAP: usize = 10;

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_manifest_history_limit() -> usize {
    MANIFEST_HISTORY_CAP
}

fn default_key_teardown_concurrency() -> usize {
    8
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("target/robofleet/store.json")
}

fn default_broadcast_capacity() -> usize {
    256
}

/// Primary configuration object for robofleet processes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "ROBOFLEET_CONFIG";

    /// Load configuration from disk, respecting the `ROBOFLEET_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.lifecycle.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

/// Tunables for the robot lifecycle operations.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Manifests included in a robot detail read, newest first.
    #[serde(default = "default_manifest_history_limit")]
    pub manifest_history_limit: usize,
    /// Maximum in-flight key deletions while tearing down a robot's ECU keys.
    #[serde(default = "default_key_teardown_concurrency")]
    pub key_teardown_concurrency: usize,
    /// Deadline applied to requests issued by the CLI. Library callers pass their own.
    #[serde(default)]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub request_timeout: Option<Duration>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            manifest_history_limit: default_manifest_history_limit(),
            key_teardown_concurrency: default_key_teardown_concurrency(),
            request_timeout: None,
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.manifest_history_limit == 0 || self.manifest_history_limit > MANIFEST_HISTORY_CAP
        {
            return Err(anyhow!(
                "lifecycle.manifest_history_limit must be between 1 and {}, got {}",
                MANIFEST_HISTORY_CAP,
                self.manifest_history_limit
            ));
        }
        if self.key_teardown_concurrency == 0 {
            return Err(anyhow!(
                "lifecycle.key_teardown_concurrency must be at least 1"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Append-only journal receiving every audit event, when set.
    #[serde(default)]
    pub journal_path: Option<PathBuf>,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            journal_path: None,
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

impl AuditConfig {
    pub fn validate(&self) -> Result<()> {
        if self.broadcast_capacity == 0 {
            return Err(anyhow!("audit.broadcast_capacity must be at least 1"));
        }
        Ok(())
    }
}
