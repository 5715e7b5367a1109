// ABOUTME: Non-fatal findings collected while a deployment runs.
// ABOUTME: Degraded signals (unknown health, empty services, lock cleanup) that never change the outcome.

use serde::Serialize;

use crate::types::{InstanceId, ServiceIdentity};

/// Warnings gathered over one attempt, in the order they were raised.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning and log it.
    pub fn warn(&mut self, warning: Warning) {
        match &warning.instance {
            Some(instance) => {
                tracing::warn!(kind = ?warning.kind, %instance, "{}", warning.message)
            }
            None => tracing::warn!(kind = ?warning.kind, "{}", warning.message),
        }
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Warnings of one kind.
    pub fn of_kind(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    /// Instance the warning is about, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceId>,
}

impl Warning {
    /// The probe returned UNKNOWN for `instance`.
    pub fn unknown_health(instance: &InstanceId) -> Self {
        Self {
            kind: WarningKind::UnknownHealth,
            message: format!("health of instance {instance} could not be determined"),
            instance: Some(instance.clone()),
        }
    }

    pub fn no_instances(service: &ServiceIdentity) -> Self {
        Self {
            kind: WarningKind::NoInstances,
            message: format!("{service} is stable with no running instances; nothing to probe"),
            instance: None,
        }
    }

    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockRelease,
            message: message.into(),
            instance: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UnknownHealth,
    NoInstances,
    /// Lock file may remain on disk.
    LockRelease,
}
