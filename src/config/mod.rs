// ABOUTME: Configuration types and parsing for rollsafe.yml.
// ABOUTME: Handles discovery, YAML parsing and env overrides for the service identity.

mod deserialize;
mod env_value;
mod healthcheck;
mod platform;
mod revision;
mod smoke;

pub use env_value::{EnvValue, resolve_env_map};
pub use healthcheck::{HealthConfig, HealthMode};
pub use platform::PlatformConfig;
pub use revision::{PortMapping, Protocol, ResolvedTemplate, RevisionTemplate, TemplateError};
pub use smoke::SmokeTestConfig;

use crate::error::{Error, Result};
use crate::types::{ClusterName, ServiceIdentity, ServiceName};
use deserialize::{deserialize_cluster_name, deserialize_service_name};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "rollsafe.yml";
pub const CONFIG_FILENAME_ALT: &str = "rollsafe.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".rollsafe/config.yml";

/// Overrides the configured cluster.
pub const CLUSTER_ENV: &str = "ROLLSAFE_CLUSTER";
/// Overrides the configured service.
pub const SERVICE_ENV: &str = "ROLLSAFE_SERVICE";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default, deserialize_with = "deserialize_cluster_name")]
    pub cluster: Option<ClusterName>,

    #[serde(default, deserialize_with = "deserialize_service_name")]
    pub service: Option<ServiceName>,

    pub platform: PlatformConfig,

    pub revision: RevisionTemplate,

    #[serde(default = "default_stabilize_timeout", with = "humantime_serde")]
    pub stabilize_timeout: Duration,

    #[serde(default = "default_rollback_timeout", with = "humantime_serde")]
    pub rollback_timeout: Duration,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub smoke_test: Option<SmokeTestConfig>,

    #[serde(default)]
    pub lock: LockConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LockConfig {
    /// Directory for lock files. Defaults to the XDG state dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_stabilize_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_rollback_timeout() -> Duration {
    Duration::from_secs(600)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Resolve the service identity. Environment variables win over the file.
    pub fn service_identity(&self) -> Result<ServiceIdentity> {
        let cluster = match non_empty_env(CLUSTER_ENV) {
            Some(value) => ClusterName::new(&value)?,
            None => self.cluster.clone().ok_or(Error::MissingIdentity {
                what: "cluster",
                env_var: CLUSTER_ENV,
            })?,
        };

        let service = match non_empty_env(SERVICE_ENV) {
            Some(value) => ServiceName::new(&value)?,
            None => self.service.clone().ok_or(Error::MissingIdentity {
                what: "service",
                env_var: SERVICE_ENV,
            })?,
        };

        Ok(ServiceIdentity::new(cluster, service))
    }

    /// Directory for deploy lock files.
    pub fn lock_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.lock.dir {
            return Ok(dir.clone());
        }
        if let Some(state) = non_empty_env("XDG_STATE_HOME") {
            return Ok(PathBuf::from(state).join("rollsafe"));
        }
        non_empty_env("HOME")
            .map(|home| PathBuf::from(home).join(".local/state/rollsafe"))
            .ok_or_else(|| {
                Error::InvalidConfig("cannot locate a lock directory: set lock.dir or HOME".into())
            })
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
