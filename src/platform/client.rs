// ABOUTME: The orchestration platform contract the deployment state machine drives.
// ABOUTME: Describe, register, update, wait-until-stable and instance listing.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;

use super::error::PlatformError;
use crate::config::RevisionTemplate;
use crate::health::HealthVerdict;
use crate::types::{ImageRef, InstanceId, RevisionId, ServiceIdentity};

/// What the platform knows about one running instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub id: InstanceId,
    /// Revision the instance runs, when the platform reports it.
    pub revision: Option<RevisionId>,
    /// `host:port` the instance serves on, when known.
    pub address: Option<String>,
    /// Health as evaluated by the platform itself.
    pub health: HealthVerdict,
}

/// Operations against the remote container orchestration platform.
///
/// Retrying transient failures is the implementation's business; callers
/// treat every returned error as final.
#[async_trait]
pub trait OrchestrationClient: Send + Sync {
    /// Revision the service currently points at. `None` if it was never deployed.
    async fn current_revision(
        &self,
        service: &ServiceIdentity,
    ) -> Result<Option<RevisionId>, PlatformError>;

    /// Register a new revision. Never touches the live service.
    ///
    /// Not idempotent: a failure the platform may already have acted on is
    /// returned rather than repeated, so no duplicate revision is registered.
    async fn register_revision(
        &self,
        image: &ImageRef,
        template: &RevisionTemplate,
    ) -> Result<RevisionId, PlatformError>;

    /// Point the service at `revision`. Repeating with the same revision is a no-op.
    async fn update_service(
        &self,
        service: &ServiceIdentity,
        revision: &RevisionId,
    ) -> Result<(), PlatformError>;

    /// Block until the service converged or `timeout` elapsed.
    ///
    /// Returns `Ok(false)` on timeout; that is an expected outcome, not an error.
    async fn wait_until_stable(
        &self,
        service: &ServiceIdentity,
        timeout: Duration,
    ) -> Result<bool, PlatformError>;

    async fn list_running_instances(
        &self,
        service: &ServiceIdentity,
    ) -> Result<BTreeSet<InstanceId>, PlatformError>;

    async fn describe_instance(
        &self,
        service: &ServiceIdentity,
        instance: &InstanceId,
    ) -> Result<InstanceInfo, PlatformError>;
}
