// ABOUTME: Post-stabilization health probe configuration.
// ABOUTME: Selects the probe implementation and its per-instance timeout.

use serde::Deserialize;
use std::time::Duration;

/// Where instance health verdicts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthMode {
    /// Ask the platform for its own view of each instance's health.
    #[default]
    Platform,
    /// GET the service's health endpoint on each instance.
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default)]
    pub mode: HealthMode,

    #[serde(default = "default_path")]
    pub path: String,

    /// Overrides the port the platform reports for each instance.
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            mode: HealthMode::default(),
            path: default_path(),
            port: None,
            timeout: default_timeout(),
        }
    }
}

fn default_path() -> String {
    "/health".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}
