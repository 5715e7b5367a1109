// ABOUTME: Deployment phases, their transition table, outcomes and type-state markers.
// ABOUTME: Markers make invalid transitions fail to compile; Phase keeps them enumerable.

use serde::Serialize;
use std::fmt;

use crate::types::RevisionId;

/// Every state a deployment attempt can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Init,
    Validated,
    Registered,
    Swapping,
    Stable,
    HealthChecked,
    Succeeded,
    RollingBack,
    RolledBack,
    RollbackFailed,
    AbortedBeforeMutation,
}

impl Phase {
    pub const ALL: [Phase; 11] = [
        Phase::Init,
        Phase::Validated,
        Phase::Registered,
        Phase::Swapping,
        Phase::Stable,
        Phase::HealthChecked,
        Phase::Succeeded,
        Phase::RollingBack,
        Phase::RolledBack,
        Phase::RollbackFailed,
        Phase::AbortedBeforeMutation,
    ];

    /// The transition table.
    pub fn successors(self) -> &'static [Phase] {
        use Phase::*;
        match self {
            Init => &[Validated, AbortedBeforeMutation],
            Validated => &[Registered, AbortedBeforeMutation],
            Registered => &[Swapping],
            Swapping => &[Stable, RollingBack],
            Stable => &[HealthChecked, RollingBack],
            HealthChecked => &[Succeeded, RollingBack],
            RollingBack => &[RolledBack, RollbackFailed],
            Succeeded | RolledBack | RollbackFailed | AbortedBeforeMutation => &[],
        }
    }

    pub fn can_transition_to(self, next: Phase) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Whether the live service may already point somewhere new.
    pub fn has_mutated(self) -> bool {
        !matches!(
            self,
            Phase::Init | Phase::Validated | Phase::Registered | Phase::AbortedBeforeMutation
        )
    }

    /// Outcome for terminal phases.
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            Phase::Succeeded => Some(Outcome::Succeeded),
            Phase::RolledBack => Some(Outcome::RolledBack),
            Phase::RollbackFailed => Some(Outcome::RollbackFailed),
            Phase::AbortedBeforeMutation => Some(Outcome::AbortedBeforeMutation),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Init => "INIT",
            Phase::Validated => "VALIDATED",
            Phase::Registered => "REGISTERED",
            Phase::Swapping => "SWAPPING",
            Phase::Stable => "STABLE",
            Phase::HealthChecked => "HEALTH_CHECKED",
            Phase::Succeeded => "SUCCEEDED",
            Phase::RollingBack => "ROLLING_BACK",
            Phase::RolledBack => "ROLLED_BACK",
            Phase::RollbackFailed => "ROLLBACK_FAILED",
            Phase::AbortedBeforeMutation => "ABORTED_BEFORE_MUTATION",
        };
        f.write_str(s)
    }
}

/// How a deployment attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Succeeded,
    RolledBack,
    /// The service is in neither the old nor the new state. Needs an operator.
    RollbackFailed,
    AbortedBeforeMutation,
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Succeeded => 0,
            Outcome::RolledBack => 1,
            Outcome::AbortedBeforeMutation => 2,
            Outcome::RollbackFailed => 3,
        }
    }

    pub fn is_success(self) -> bool {
        self == Outcome::Succeeded
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Succeeded => "SUCCEEDED",
            Outcome::RolledBack => "ROLLED_BACK",
            Outcome::RollbackFailed => "ROLLBACK_FAILED",
            Outcome::AbortedBeforeMutation => "ABORTED_BEFORE_MUTATION",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Type-state markers
// =============================================================================

/// Links a marker type to its phase.
pub trait DeployState {
    const PHASE: Phase;
}

/// Markers for states reached before anything on the platform changed.
/// Available actions include `abort()`.
pub trait PreMutation: DeployState {}

/// Markers for states after the swap was issued.
/// Available actions include `rollback()`.
pub trait Mutated: DeployState {}

/// Nothing observed yet.
/// Available actions: `validate()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Init;

/// Current revision captured (possibly absent).
/// Available actions: `register()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Validated;

/// New revision registered, live service untouched.
/// Available actions: `swap()`
#[derive(Debug, Clone)]
pub struct Registered {
    revision: RevisionId,
}

/// Update issued; the live service may already run the new revision.
/// Available actions: `rollback()`
#[derive(Debug, Clone)]
pub struct Swapping {
    revision: RevisionId,
}

/// Service converged on the new revision.
/// Available actions: `check_health()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Stable {
    revision: RevisionId,
}

/// No instance reported unhealthy.
/// Available actions: `smoke_test()`, `rollback()`
#[derive(Debug, Clone)]
pub struct HealthChecked {
    revision: RevisionId,
}

/// Deployment finished.
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct Succeeded {
    revision: RevisionId,
}

macro_rules! revision_state {
    ($($ty:ident),*) => {$(
        impl $ty {
            pub(crate) fn new(revision: RevisionId) -> Self {
                Self { revision }
            }

            pub fn revision(&self) -> &RevisionId {
                &self.revision
            }
        }
    )*};
}

revision_state!(Registered, Swapping, Stable, HealthChecked, Succeeded);

impl DeployState for Init {
    const PHASE: Phase = Phase::Init;
}
impl DeployState for Validated {
    const PHASE: Phase = Phase::Validated;
}
impl DeployState for Registered {
    const PHASE: Phase = Phase::Registered;
}
impl DeployState for Swapping {
    const PHASE: Phase = Phase::Swapping;
}
impl DeployState for Stable {
    const PHASE: Phase = Phase::Stable;
}
impl DeployState for HealthChecked {
    const PHASE: Phase = Phase::HealthChecked;
}
impl DeployState for Succeeded {
    const PHASE: Phase = Phase::Succeeded;
}

impl PreMutation for Init {}
impl PreMutation for Validated {}

impl Mutated for Swapping {}
impl Mutated for Stable {}
impl Mutated for HealthChecked {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_phases_follow_the_table() {
        assert!(Init::PHASE.can_transition_to(Validated::PHASE));
        assert!(Validated::PHASE.can_transition_to(Registered::PHASE));
        assert!(Registered::PHASE.can_transition_to(Swapping::PHASE));
        assert!(Swapping::PHASE.can_transition_to(Stable::PHASE));
        assert!(Stable::PHASE.can_transition_to(HealthChecked::PHASE));
        assert!(HealthChecked::PHASE.can_transition_to(Succeeded::PHASE));
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes: std::collections::HashSet<_> = [
            Outcome::Succeeded,
            Outcome::RolledBack,
            Outcome::RollbackFailed,
            Outcome::AbortedBeforeMutation,
        ]
        .iter()
        .map(|o| o.exit_code())
        .collect();
        assert_eq!(codes.len(), 4);
        assert_eq!(Outcome::Succeeded.exit_code(), 0);
    }

    #[test]
    fn phases_display_in_screaming_case() {
        assert_eq!(Phase::AbortedBeforeMutation.to_string(), "ABORTED_BEFORE_MUTATION");
        assert_eq!(
            serde_json::to_string(&Phase::HealthChecked).unwrap(),
            "\"HEALTH_CHECKED\""
        );
    }
}
