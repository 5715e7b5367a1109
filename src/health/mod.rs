// ABOUTME: Health probing of running instances after a stable swap.
// ABOUTME: Verdicts, the aggregated report and the HealthProbe capability trait.

mod http_probe;
mod platform_probe;

pub use http_probe::HttpHealthProbe;
pub use platform_probe::PlatformHealthProbe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::InstanceId;

/// Health of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthVerdict {
    Healthy,
    Unhealthy,
    /// Not evaluated yet, or the probe could not tell. Does not fail a deployment.
    #[default]
    Unknown,
}

impl std::fmt::Display for HealthVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthVerdict::Healthy => "HEALTHY",
            HealthVerdict::Unhealthy => "UNHEALTHY",
            HealthVerdict::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Query health of a single running instance.
///
/// Implementations bound each check with their own timeout and never fail:
/// anything that prevents a verdict is reported as [`HealthVerdict::Unknown`].
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, instance: &InstanceId) -> HealthVerdict;
}

/// Verdict per running instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    verdicts: BTreeMap<InstanceId, HealthVerdict>,
}

impl HealthReport {
    pub fn insert(&mut self, instance: InstanceId, verdict: HealthVerdict) {
        self.verdicts.insert(instance, verdict);
    }

    pub fn get(&self, instance: &InstanceId) -> Option<HealthVerdict> {
        self.verdicts.get(instance).copied()
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    /// True when at least one instance is unhealthy.
    pub fn is_failing(&self) -> bool {
        self.unhealthy().next().is_some()
    }

    pub fn unhealthy(&self) -> impl Iterator<Item = &InstanceId> {
        self.with_verdict(HealthVerdict::Unhealthy)
    }

    pub fn unknown(&self) -> impl Iterator<Item = &InstanceId> {
        self.with_verdict(HealthVerdict::Unknown)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InstanceId, HealthVerdict)> {
        self.verdicts.iter().map(|(id, v)| (id, *v))
    }

    fn with_verdict(&self, verdict: HealthVerdict) -> impl Iterator<Item = &InstanceId> {
        self.verdicts
            .iter()
            .filter(move |(_, v)| **v == verdict)
            .map(|(id, _)| id)
    }
}

impl FromIterator<(InstanceId, HealthVerdict)> for HealthReport {
    fn from_iter<I: IntoIterator<Item = (InstanceId, HealthVerdict)>>(iter: I) -> Self {
        Self {
            verdicts: iter.into_iter().collect(),
        }
    }
}

/// Probe every instance. Checks run concurrently, each under the probe's own bound.
pub async fn probe_all<P: HealthProbe + ?Sized>(
    probe: &P,
    instances: &BTreeSet<InstanceId>,
) -> HealthReport {
    let checks = instances.iter().map(|id| async move {
        let verdict = probe.check(id).await;
        tracing::debug!(instance = %id, %verdict, "health verdict");
        (id.clone(), verdict)
    });

    futures::future::join_all(checks).await.into_iter().collect()
}
