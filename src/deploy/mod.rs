// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports state markers, the coordinator, rollback controller and deploy lock.

mod attempt;
mod coordinator;
mod deployment;
mod error;
mod lock;
mod rollback;
mod state;
mod transitions;

pub use attempt::{DeploymentAttempt, InvalidTransition};
pub use coordinator::{CoordinatorSettings, DeploymentCoordinator, DeploymentReport};
pub use deployment::Deployment;
pub use error::{
    DeployError, DeployErrorKind, LockError, LockErrorKind, LockHolderInfo, RollbackError,
};
pub use lock::{DeployLock, LockInfo};
pub use rollback::RollbackController;
pub use state::{
    DeployState, HealthChecked, Init, Mutated, Outcome, Phase, PreMutation, Registered, Stable,
    Succeeded, Swapping, Validated,
};
pub use transitions::TransitionResult;
