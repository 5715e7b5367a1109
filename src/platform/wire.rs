// ABOUTME: JSON bodies of the vendor-neutral orchestration API.
// ABOUTME: Also decides when a reported service status counts as stable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::client::InstanceInfo;
use crate::config::{PortMapping, ResolvedTemplate};
use crate::health::HealthVerdict;
use crate::types::{ImageRef, InstanceId, RevisionId};

const RUNNING: &str = "RUNNING";
const STOPPED: &str = "STOPPED";

#[derive(Debug, Deserialize)]
pub struct ServiceBody {
    #[serde(default)]
    pub revision: Option<RevisionId>,
}

#[derive(Debug, Serialize)]
pub struct RegisterRevisionRequest<'a> {
    pub family: &'a str,
    pub container: &'a str,
    pub image: String,
    pub env: &'a BTreeMap<String, String>,
    pub ports: &'a [PortMapping],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mib: Option<u64>,
}

impl<'a> RegisterRevisionRequest<'a> {
    pub fn new(image: &ImageRef, template: &'a ResolvedTemplate) -> Self {
        Self {
            family: &template.family,
            container: &template.container,
            image: image.to_string(),
            env: &template.env,
            ports: &template.ports,
            command: template.command.as_deref(),
            cpu: template.cpu,
            memory_mib: template.memory_mib,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRevisionResponse {
    pub revision: RevisionId,
}

#[derive(Debug, Serialize)]
pub struct UpdateServiceRequest<'a> {
    pub revision: &'a RevisionId,
}

#[derive(Debug, Deserialize)]
pub struct ServiceStatus {
    /// Desired revision.
    #[serde(default)]
    pub revision: Option<RevisionId>,
    pub desired_count: u32,
    #[serde(default)]
    pub instances: Vec<InstanceBody>,
}

impl ServiceStatus {
    /// Desired count running on the desired revision, nothing else left alive.
    pub fn is_stable(&self) -> bool {
        let Some(target) = &self.revision else {
            return false;
        };

        let on_target = self
            .instances
            .iter()
            .filter(|i| i.is_running() && i.revision.as_ref() == Some(target))
            .count();

        let stragglers = self
            .instances
            .iter()
            .any(|i| i.revision.as_ref() != Some(target) && !i.is_stopped());

        on_target == self.desired_count as usize && !stragglers
    }
}

#[derive(Debug, Deserialize)]
pub struct InstanceList {
    #[serde(default)]
    pub instances: Vec<InstanceBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceBody {
    pub id: InstanceId,
    #[serde(default)]
    pub revision: Option<RevisionId>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub health: HealthVerdict,
}

impl InstanceBody {
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case(RUNNING)
    }

    fn is_stopped(&self) -> bool {
        self.state.eq_ignore_ascii_case(STOPPED)
    }
}

impl From<InstanceBody> for InstanceInfo {
    fn from(body: InstanceBody) -> Self {
        InstanceInfo {
            id: body.id,
            revision: body.revision,
            address: body.address,
            health: body.health,
        }
    }
}

/// Error bodies look like `{"message": "..."}`; fall back to the raw text.
pub fn error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string())
}
