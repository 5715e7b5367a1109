// ABOUTME: Connection settings for the orchestration platform API.
// ABOUTME: Endpoint, per-request timeout, transient retry policy and poll cadence.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// `http://host:port` or `unix:///path/to.sock`.
    pub endpoint: String,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Extra attempts for transient failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_backoff", with = "humantime_serde")]
    pub retry_backoff: Duration,

    /// How often to poll service status while waiting for stability.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl PlatformConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: default_request_timeout(),
            retries: default_retries(),
            retry_backoff: default_retry_backoff(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retries() -> u32 {
    3
}

fn default_retry_backoff() -> Duration {
    Duration::from_secs(2)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}
