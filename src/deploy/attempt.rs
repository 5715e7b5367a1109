// ABOUTME: Record of a single deployment attempt: identity, revisions, phase history.
// ABOUTME: The only place phase changes are written; every change is checked against the table.

use chrono::{DateTime, Utc};

use super::error::{DeployError, RollbackError};
use super::state::{Outcome, Phase};
use crate::health::HealthReport;
use crate::types::{ImageRef, RevisionId, ServiceIdentity};

/// A phase change the transition table does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid phase transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: Phase,
    pub to: Phase,
}

#[derive(Debug)]
pub struct DeploymentAttempt {
    service: ServiceIdentity,
    image: ImageRef,
    previous_revision: Option<RevisionId>,
    new_revision: Option<RevisionId>,
    phase: Phase,
    history: Vec<Phase>,
    health: Option<HealthReport>,
    failure: Option<DeployError>,
    rollback_error: Option<RollbackError>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl DeploymentAttempt {
    pub fn new(service: ServiceIdentity, image: ImageRef) -> Self {
        Self {
            service,
            image,
            previous_revision: None,
            new_revision: None,
            phase: Phase::Init,
            history: vec![Phase::Init],
            health: None,
            failure: None,
            rollback_error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to `next` if the table allows it.
    pub fn try_advance(&mut self, next: Phase) -> Result<(), InvalidTransition> {
        if !self.phase.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!(service = %self.service, from = %self.phase, to = %next, "phase change");
        self.phase = next;
        self.history.push(next);
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Used by the typed transitions, which are valid by construction.
    pub(crate) fn enter(&mut self, next: Phase) {
        let result = self.try_advance(next);
        debug_assert!(result.is_ok(), "{result:?}");
    }

    /// Captured once, before the first mutation.
    pub(crate) fn record_previous(&mut self, previous: Option<RevisionId>) {
        debug_assert_eq!(self.phase, Phase::Init);
        self.previous_revision = previous;
    }

    pub(crate) fn record_new_revision(&mut self, revision: RevisionId) {
        self.new_revision = Some(revision);
    }

    pub(crate) fn record_health(&mut self, report: HealthReport) {
        self.health = Some(report);
    }

    /// Keeps the first cause; later failures do not overwrite it.
    pub(crate) fn record_failure(&mut self, error: DeployError) {
        if self.failure.is_none() {
            self.failure = Some(error);
        }
    }

    pub(crate) fn record_rollback_error(&mut self, error: RollbackError) {
        self.rollback_error = Some(error);
    }

    pub fn service(&self) -> &ServiceIdentity {
        &self.service
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Revision live before this attempt. `None` on a first deployment.
    pub fn previous_revision(&self) -> Option<&RevisionId> {
        self.previous_revision.as_ref()
    }

    pub fn new_revision(&self) -> Option<&RevisionId> {
        self.new_revision.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase visited, in order, starting with `Init`.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn health(&self) -> Option<&HealthReport> {
        self.health.as_ref()
    }

    pub fn failure(&self) -> Option<&DeployError> {
        self.failure.as_ref()
    }

    pub fn rollback_error(&self) -> Option<&RollbackError> {
        self.rollback_error.as_ref()
    }

    /// Set once a terminal phase is reached.
    pub fn outcome(&self) -> Option<Outcome> {
        self.phase.outcome()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }
}
