// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: State types carry their own data for compile-time guarantees.

use crate::types::{ImageRef, RevisionId, ServiceIdentity};

use super::attempt::DeploymentAttempt;
use super::state::{HealthChecked, Init, Registered, Stable, Succeeded, Swapping};

/// A deployment in progress, parameterized by its current state.
///
/// Later states carry the newly registered revision in `S`, so code holding a
/// `Deployment<Stable>` can never observe a missing revision.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) attempt: DeploymentAttempt,
    pub(crate) state: S,
}

impl Deployment<Init> {
    pub fn new(service: ServiceIdentity, image: ImageRef) -> Self {
        Deployment {
            attempt: DeploymentAttempt::new(service, image),
            state: Init,
        }
    }
}

impl<S> Deployment<S> {
    pub fn service(&self) -> &ServiceIdentity {
        self.attempt.service()
    }

    pub fn image(&self) -> &ImageRef {
        self.attempt.image()
    }

    /// Revision live before this deployment (None on first deploy).
    pub fn previous_revision(&self) -> Option<&RevisionId> {
        self.attempt.previous_revision()
    }

    pub fn attempt(&self) -> &DeploymentAttempt {
        &self.attempt
    }

    pub fn state(&self) -> &S {
        &self.state
    }
}

macro_rules! new_revision_accessor {
    ($($ty:ident),*) => {$(
        impl Deployment<$ty> {
            pub fn new_revision(&self) -> &RevisionId {
                self.state.revision()
            }
        }
    )*};
}

new_revision_accessor!(Registered, Swapping, Stable, HealthChecked, Succeeded);
