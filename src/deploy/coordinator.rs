// ABOUTME: Drives one deployment attempt through the typed transitions to a terminal outcome.
// ABOUTME: Never returns an error; every failure is folded into the report.

use std::time::Duration;
use tracing::Instrument;

use crate::config::{Config, RevisionTemplate};
use crate::diagnostics::Diagnostics;
use crate::health::HealthProbe;
use crate::platform::OrchestrationClient;
use crate::smoke::SmokeTestRunner;
use crate::types::{ImageRef, ServiceIdentity};

use super::Deployment;
use super::attempt::DeploymentAttempt;
use super::error::DeployError;
use super::rollback::RollbackController;
use super::state::{Init, Mutated, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub stabilize_timeout: Duration,
    pub rollback_timeout: Duration,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stabilize_timeout: config.stabilize_timeout,
            rollback_timeout: config.rollback_timeout,
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            stabilize_timeout: Duration::from_secs(600),
            rollback_timeout: Duration::from_secs(600),
        }
    }
}

/// Everything known about a finished attempt.
#[derive(Debug)]
pub struct DeploymentReport {
    pub attempt: DeploymentAttempt,
    pub diagnostics: Diagnostics,
}

impl DeploymentReport {
    /// An attempt that somehow stopped short of a terminal phase is reported
    /// as needing an operator.
    pub fn outcome(&self) -> Outcome {
        self.attempt.outcome().unwrap_or(Outcome::RollbackFailed)
    }
}

pub struct DeploymentCoordinator<'a, C: ?Sized, P: ?Sized, R: ?Sized> {
    client: &'a C,
    probe: &'a P,
    smoke: &'a R,
    settings: CoordinatorSettings,
}

impl<'a, C, P, R> DeploymentCoordinator<'a, C, P, R>
where
    C: OrchestrationClient + ?Sized,
    P: HealthProbe + ?Sized,
    R: SmokeTestRunner + ?Sized,
{
    pub fn new(client: &'a C, probe: &'a P, smoke: &'a R, settings: CoordinatorSettings) -> Self {
        Self {
            client,
            probe,
            smoke,
            settings,
        }
    }

    /// Deploy `image` to `service`.
    ///
    /// Runs: observe current revision, register, swap and wait, probe health,
    /// smoke test. A failure before the swap aborts; a failure after it rolls
    /// back to the observed revision.
    pub async fn run(
        &self,
        service: ServiceIdentity,
        image: ImageRef,
        template: &RevisionTemplate,
    ) -> DeploymentReport {
        let span = tracing::info_span!("deploy", %service, %image);

        let mut diagnostics = Diagnostics::default();
        let attempt = self
            .drive(Deployment::new(service, image), template, &mut diagnostics)
            .instrument(span.clone())
            .await;
        let _enter = span.enter();

        let report = DeploymentReport {
            attempt,
            diagnostics,
        };
        tracing::info!(outcome = %report.outcome(), "deployment finished");
        report
    }

    async fn drive(
        &self,
        deployment: Deployment<Init>,
        template: &RevisionTemplate,
        diagnostics: &mut Diagnostics,
    ) -> DeploymentAttempt {
        let deployment = match deployment.validate(self.client).await {
            Ok(d) => d,
            Err((d, e)) => return d.abort(e),
        };

        let deployment = match deployment.register(self.client, template).await {
            Ok(d) => d,
            Err((d, e)) => return d.abort(e),
        };

        let deployment = match deployment
            .swap(self.client, self.settings.stabilize_timeout)
            .await
        {
            Ok(d) => d,
            Err((d, e)) => return self.roll_back(d, e).await,
        };

        let deployment = match deployment
            .check_health(self.client, self.probe, diagnostics)
            .await
        {
            Ok(d) => d,
            Err((d, e)) => return self.roll_back(d, e).await,
        };

        match deployment.smoke_test(self.smoke).await {
            Ok(d) => d.finish(),
            Err((d, e)) => self.roll_back(d, e).await,
        }
    }

    async fn roll_back<S: Mutated>(
        &self,
        deployment: Deployment<S>,
        cause: DeployError,
    ) -> DeploymentAttempt {
        let controller = RollbackController::new(self.client);
        deployment
            .rollback(&controller, self.settings.rollback_timeout, cause)
            .await
    }
}
