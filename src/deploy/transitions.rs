// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::time::Duration;

use crate::config::RevisionTemplate;
use crate::diagnostics::{Diagnostics, Warning};
use crate::health::{self, HealthProbe};
use crate::platform::OrchestrationClient;
use crate::smoke::SmokeTestRunner;

use super::Deployment;
use super::attempt::DeploymentAttempt;
use super::error::DeployError;
use super::rollback::RollbackController;
use super::state::{
    DeployState, HealthChecked, Init, Mutated, Phase, PreMutation, Registered, Stable, Succeeded,
    Swapping, Validated,
};

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<Deployment<T>, (Deployment<S>, DeployError)>;

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Deployment<S> {
    fn transition<T: DeployState>(mut self, state: T) -> Deployment<T> {
        self.attempt.enter(T::PHASE);
        Deployment {
            attempt: self.attempt,
            state,
        }
    }
}

// =============================================================================
// Init -> Validated
// =============================================================================

impl Deployment<Init> {
    /// Capture the revision currently live. This is the rollback target for
    /// the rest of the attempt and is never re-read.
    pub async fn validate<C: OrchestrationClient + ?Sized>(
        mut self,
        client: &C,
    ) -> TransitionResult<Validated, Init> {
        match client.current_revision(self.service()).await {
            Ok(previous) => {
                match &previous {
                    Some(revision) => {
                        tracing::info!(service = %self.service(), %revision, "current revision")
                    }
                    None => tracing::info!(service = %self.service(), "first deployment"),
                }
                self.attempt.record_previous(previous);
                Ok(self.transition(Validated))
            }
            Err(e) => Err((self, DeployError::CurrentRevision(e))),
        }
    }
}

// =============================================================================
// Validated -> Registered
// =============================================================================

impl Deployment<Validated> {
    /// Register a new revision for the image. The live service is untouched.
    pub async fn register<C: OrchestrationClient + ?Sized>(
        mut self,
        client: &C,
        template: &RevisionTemplate,
    ) -> TransitionResult<Registered, Validated> {
        match client.register_revision(self.image(), template).await {
            Ok(revision) => {
                tracing::info!(image = %self.image(), %revision, "registered revision");
                self.attempt.record_new_revision(revision.clone());
                Ok(self.transition(Registered::new(revision)))
            }
            Err(e) => Err((self, DeployError::Register(e))),
        }
    }
}

// =============================================================================
// Registered -> Swapping -> Stable
// =============================================================================

impl Deployment<Registered> {
    /// Point the service at the new revision and wait for it to converge.
    ///
    /// The attempt counts as mutated from the moment the update is issued,
    /// so every failure here comes back as `Deployment<Swapping>` and must be
    /// rolled back.
    pub async fn swap<C: OrchestrationClient + ?Sized>(
        self,
        client: &C,
        timeout: Duration,
    ) -> TransitionResult<Stable, Swapping> {
        let revision = self.state.revision().clone();
        let swapping = self.transition(Swapping::new(revision.clone()));
        let service = swapping.service().clone();

        tracing::info!(%service, %revision, "updating service");
        if let Err(e) = client.update_service(&service, &revision).await {
            return Err((swapping, DeployError::Update(e)));
        }

        match client.wait_until_stable(&service, timeout).await {
            Ok(true) => {
                tracing::info!(%service, "service stable");
                Ok(swapping.transition(Stable::new(revision)))
            }
            Ok(false) => Err((swapping, DeployError::NotStable(timeout))),
            Err(e) => Err((swapping, DeployError::Wait(e))),
        }
    }
}

// =============================================================================
// Stable -> HealthChecked
// =============================================================================

impl Deployment<Stable> {
    /// Probe every running instance.
    ///
    /// Any UNHEALTHY verdict fails the check. UNKNOWN verdicts do not, but are
    /// recorded as warnings.
    pub async fn check_health<C, P>(
        mut self,
        client: &C,
        probe: &P,
        diagnostics: &mut Diagnostics,
    ) -> TransitionResult<HealthChecked, Stable>
    where
        C: OrchestrationClient + ?Sized,
        P: HealthProbe + ?Sized,
    {
        let instances = match client.list_running_instances(self.service()).await {
            Ok(instances) => instances,
            Err(e) => return Err((self, DeployError::ListInstances(e))),
        };

        if instances.is_empty() {
            diagnostics.warn(Warning::no_instances(self.service()));
        }

        let report = health::probe_all(probe, &instances).await;
        tracing::info!(
            service = %self.service(),
            instances = report.len(),
            "health checks complete"
        );

        for instance in report.unknown() {
            diagnostics.warn(Warning::unknown_health(instance));
        }

        let unhealthy: Vec<_> = report.unhealthy().cloned().collect();
        self.attempt.record_health(report);

        if !unhealthy.is_empty() {
            return Err((self, DeployError::Unhealthy(unhealthy)));
        }

        let revision = self.state.revision().clone();
        Ok(self.transition(HealthChecked::new(revision)))
    }
}

// =============================================================================
// HealthChecked -> Succeeded
// =============================================================================

impl Deployment<HealthChecked> {
    pub async fn smoke_test<R: SmokeTestRunner + ?Sized>(
        self,
        smoke: &R,
    ) -> TransitionResult<Succeeded, HealthChecked> {
        if smoke.run().await.is_pass() {
            let revision = self.state.revision().clone();
            Ok(self.transition(Succeeded::new(revision)))
        } else {
            Err((self, DeployError::SmokeTestFailed))
        }
    }
}

impl Deployment<Succeeded> {
    pub fn finish(self) -> DeploymentAttempt {
        tracing::info!(
            service = %self.service(),
            revision = %self.new_revision(),
            "deployment succeeded"
        );
        self.attempt
    }
}

// =============================================================================
// Terminal exits
// =============================================================================

impl<S: PreMutation> Deployment<S> {
    /// End the attempt before anything changed on the platform.
    pub fn abort(mut self, cause: DeployError) -> DeploymentAttempt {
        tracing::error!(service = %self.service(), error = %cause, "deployment aborted before mutation");
        self.attempt.record_failure(cause);
        self.attempt.enter(Phase::AbortedBeforeMutation);
        self.attempt
    }
}

impl<S: Mutated> Deployment<S> {
    /// Restore the captured previous revision.
    ///
    /// Ends in `RolledBack` only when the service verifiably converged on the
    /// previous revision; anything else ends in `RollbackFailed`.
    pub async fn rollback<C: OrchestrationClient + ?Sized>(
        mut self,
        controller: &RollbackController<'_, C>,
        timeout: Duration,
        cause: DeployError,
    ) -> DeploymentAttempt {
        tracing::warn!(service = %self.service(), error = %cause, "deployment failed, rolling back");
        self.attempt.record_failure(cause);
        self.attempt.enter(Phase::RollingBack);

        let service = self.attempt.service().clone();
        let target = self.attempt.previous_revision().cloned();
        match controller.rollback(&service, target.as_ref(), timeout).await {
            Ok(()) => self.attempt.enter(Phase::RolledBack),
            Err(e) => {
                tracing::error!(%service, error = %e, "rollback failed; manual intervention required");
                self.attempt.record_rollback_error(e);
                self.attempt.enter(Phase::RollbackFailed);
            }
        }
        self.attempt
    }
}
