// ABOUTME: Smoke-test execution after a stable, healthy swap.
// ABOUTME: Runs an external command and reduces it to pass or fail.

use async_trait::async_trait;
use nonempty::NonEmpty;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::SmokeTestConfig;
use crate::types::{ImageRef, ServiceIdentity};

/// Result of a smoke-test run. There is nothing in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmokeResult {
    Pass,
    Fail,
}

impl SmokeResult {
    pub fn is_pass(self) -> bool {
        self == SmokeResult::Pass
    }
}

/// Execute the post-deployment validation suite.
#[async_trait]
pub trait SmokeTestRunner: Send + Sync {
    async fn run(&self) -> SmokeResult;
}

/// Runs a command; exit status 0 passes, everything else fails.
#[derive(Debug, Clone)]
pub struct CommandSmokeTest {
    command: NonEmpty<String>,
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandSmokeTest {
    pub fn new(command: NonEmpty<String>, timeout: Duration) -> Self {
        Self {
            command,
            env: HashMap::new(),
            working_dir: None,
            timeout,
        }
    }

    /// Build from config, exposing the deployment to the command via env vars.
    pub fn from_config(config: &SmokeTestConfig, service: &ServiceIdentity, image: &ImageRef) -> Self {
        Self::new(config.command.clone(), config.timeout)
            .env("ROLLSAFE_CLUSTER", service.cluster().as_str())
            .env("ROLLSAFE_SERVICE", service.service().as_str())
            .env("ROLLSAFE_IMAGE", image.to_string())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn program(&self) -> &str {
        &self.command.head
    }
}

#[async_trait]
impl SmokeTestRunner for CommandSmokeTest {
    async fn run(&self) -> SmokeResult {
        let mut command = Command::new(self.program());
        command
            .args(&self.command.tail)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        tracing::info!(program = self.program(), "running smoke test");

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(program = self.program(), error = %e, "failed to start smoke test");
                return SmokeResult::Fail;
            }
        };

        // Dropping the child on timeout kills it (kill_on_drop).
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::error!(program = self.program(), error = %e, "smoke test wait failed");
                return SmokeResult::Fail;
            }
            Err(_elapsed) => {
                tracing::warn!(program = self.program(), timeout = ?self.timeout, "smoke test timed out");
                return SmokeResult::Fail;
            }
        };

        tracing::debug!(
            stdout = %String::from_utf8_lossy(&output.stdout),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "smoke test output"
        );

        if output.status.success() {
            tracing::info!("smoke test passed");
            SmokeResult::Pass
        } else {
            tracing::warn!(exit_code = ?output.status.code(), "smoke test failed");
            SmokeResult::Fail
        }
    }
}

/// Stand-in when no smoke test is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkippedSmokeTest;

#[async_trait]
impl SmokeTestRunner for SkippedSmokeTest {
    async fn run(&self) -> SmokeResult {
        tracing::info!("no smoke test configured, skipping");
        SmokeResult::Pass
    }
}
