// ABOUTME: Smoke-test command configuration.
// ABOUTME: The command is an argv list (or a single path) plus a hard timeout.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::time::Duration;

use super::deserialize::deserialize_command;

#[derive(Debug, Clone, Deserialize)]
pub struct SmokeTestConfig {
    #[serde(deserialize_with = "deserialize_command")]
    pub command: NonEmpty<String>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}
