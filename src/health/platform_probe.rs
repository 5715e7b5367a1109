// ABOUTME: Health probe that trusts the platform's own per-instance health status.

use async_trait::async_trait;
use std::time::Duration;

use super::{HealthProbe, HealthVerdict};
use crate::platform::OrchestrationClient;
use crate::types::{InstanceId, ServiceIdentity};

pub struct PlatformHealthProbe<'a, C> {
    client: &'a C,
    service: ServiceIdentity,
    timeout: Duration,
}

impl<'a, C: OrchestrationClient> PlatformHealthProbe<'a, C> {
    pub fn new(client: &'a C, service: ServiceIdentity, timeout: Duration) -> Self {
        Self {
            client,
            service,
            timeout,
        }
    }
}

#[async_trait]
impl<'a, C: OrchestrationClient> HealthProbe for PlatformHealthProbe<'a, C> {
    async fn check(&self, instance: &InstanceId) -> HealthVerdict {
        let describe = self.client.describe_instance(&self.service, instance);
        match tokio::time::timeout(self.timeout, describe).await {
            Ok(Ok(info)) => info.health,
            Ok(Err(e)) => {
                tracing::warn!(%instance, error = %e, "cannot describe instance");
                HealthVerdict::Unknown
            }
            Err(_elapsed) => {
                tracing::warn!(%instance, timeout = ?self.timeout, "health probe timed out");
                HealthVerdict::Unknown
            }
        }
    }
}
