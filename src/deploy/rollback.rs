// ABOUTME: Restores a service to the revision it ran before a failed deployment.
// ABOUTME: Only ever targets the captured previous revision, never a guess.

use std::time::Duration;

use crate::platform::OrchestrationClient;
use crate::types::{RevisionId, ServiceIdentity};

use super::error::RollbackError;

/// Points a service back at a known-good revision and waits for it to converge.
pub struct RollbackController<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C: OrchestrationClient + ?Sized> RollbackController<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Roll `service` back to `target`.
    ///
    /// With no target (first deployment) there is nothing to restore and the
    /// rollback fails without touching the platform.
    ///
    /// # Errors
    ///
    /// Returns `RollbackError` when the service did not verifiably return to
    /// `target`. The service state is then unknown.
    pub async fn rollback(
        &self,
        service: &ServiceIdentity,
        target: Option<&RevisionId>,
        timeout: Duration,
    ) -> Result<(), RollbackError> {
        let Some(target) = target else {
            tracing::error!(%service, "no previous revision to roll back to");
            return Err(RollbackError::NoTarget);
        };

        tracing::info!(%service, revision = %target, "rolling back");

        self.client
            .update_service(service, target)
            .await
            .map_err(RollbackError::UpdateFailed)?;

        match self.client.wait_until_stable(service, timeout).await {
            Ok(true) => {
                tracing::info!(%service, revision = %target, "rollback stable");
                Ok(())
            }
            Ok(false) => Err(RollbackError::NotStable(timeout)),
            Err(e) => Err(RollbackError::WaitFailed(e)),
        }
    }
}
