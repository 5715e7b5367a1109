// ABOUTME: Error types for deployment transitions, rollback and the deploy lock.
// ABOUTME: DeployErrorKind gives callers a stable handle to match on.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

use crate::platform::PlatformError;
use crate::types::InstanceId;

/// Why a deployment attempt left the happy path.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("failed to read current revision: {0}")]
    CurrentRevision(PlatformError),

    #[error("failed to register revision: {0}")]
    Register(PlatformError),

    #[error("failed to update service: {0}")]
    Update(PlatformError),

    #[error("failed while waiting for the service to stabilize: {0}")]
    Wait(PlatformError),

    #[error("service did not stabilize within {0:?}")]
    NotStable(Duration),

    #[error("failed to list running instances: {0}")]
    ListInstances(PlatformError),

    #[error("unhealthy instances: {}", join_ids(.0))]
    Unhealthy(Vec<InstanceId>),

    #[error("smoke test failed")]
    SmokeTestFailed,
}

fn join_ids(ids: &[InstanceId]) -> String {
    ids.iter()
        .map(InstanceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Flat classification of [`DeployError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    CurrentRevision,
    Register,
    Update,
    Wait,
    NotStable,
    ListInstances,
    Unhealthy,
    SmokeTestFailed,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::CurrentRevision(_) => DeployErrorKind::CurrentRevision,
            DeployError::Register(_) => DeployErrorKind::Register,
            DeployError::Update(_) => DeployErrorKind::Update,
            DeployError::Wait(_) => DeployErrorKind::Wait,
            DeployError::NotStable(_) => DeployErrorKind::NotStable,
            DeployError::ListInstances(_) => DeployErrorKind::ListInstances,
            DeployError::Unhealthy(_) => DeployErrorKind::Unhealthy,
            DeployError::SmokeTestFailed => DeployErrorKind::SmokeTestFailed,
        }
    }

    /// True when the failure happened before the live service was touched.
    pub fn is_pre_mutation(&self) -> bool {
        matches!(
            self,
            DeployError::CurrentRevision(_) | DeployError::Register(_)
        )
    }

    /// Underlying platform error, if any.
    pub fn platform_error(&self) -> Option<&PlatformError> {
        match self {
            DeployError::CurrentRevision(e)
            | DeployError::Register(e)
            | DeployError::Update(e)
            | DeployError::Wait(e)
            | DeployError::ListInstances(e) => Some(e),
            _ => None,
        }
    }
}

/// Why a rollback did not restore the previous revision.
#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("no previous revision to roll back to")]
    NoTarget,

    #[error("failed to point service back at previous revision: {0}")]
    UpdateFailed(PlatformError),

    #[error("failed while waiting for the rollback to stabilize: {0}")]
    WaitFailed(PlatformError),

    #[error("rollback did not stabilize within {0:?}")]
    NotStable(Duration),
}

/// Holder details of a lock we could not take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolderInfo {
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "deploy lock held by {} (pid {}) since {}; pass --force to break it",
        .info.holder, .info.pid, .info.started_at
    )]
    Held { path: PathBuf, info: LockHolderInfo },

    #[error("deploy lock at {0} was taken by another process while breaking it")]
    Contended(PathBuf),

    #[error("deploy lock at {0} is unreadable and may still be in use; retry or pass --force")]
    Unreadable(PathBuf),

    #[error("deploy lock I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize lock info: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockErrorKind {
    Held,
    Contended,
    Unreadable,
    Io,
    Serialize,
}

impl LockError {
    pub fn kind(&self) -> LockErrorKind {
        match self {
            LockError::Held { .. } => LockErrorKind::Held,
            LockError::Contended(_) => LockErrorKind::Contended,
            LockError::Unreadable(_) => LockErrorKind::Unreadable,
            LockError::Io { .. } => LockErrorKind::Io,
            LockError::Serialize(_) => LockErrorKind::Serialize,
        }
    }

    pub fn holder_info(&self) -> Option<&LockHolderInfo> {
        match self {
            LockError::Held { info, .. } => Some(info),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LockError::Io {
            path: path.into(),
            source,
        }
    }
}
