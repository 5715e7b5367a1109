// ABOUTME: Application-wide error types for rollsafe.
// ABOUTME: Covers everything that can stop a run before the coordinator starts.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::LockError;
use crate::platform::PlatformError;
use crate::types::{ImageTagError, NameError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("{what} is not set: configure `{what}` or export {env_var}")]
    MissingIdentity {
        what: &'static str,
        env_var: &'static str,
    },

    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    #[error("invalid image tag: {0}")]
    InvalidTag(#[from] ImageTagError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("platform client setup failed: {0}")]
    Platform(#[from] PlatformError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
