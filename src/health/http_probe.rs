// ABOUTME: Health probe that calls each instance's HTTP health endpoint.
// ABOUTME: 200 with {"status": "OK"} is healthy; transport trouble is UNKNOWN.

use async_trait::async_trait;
use hyper::{Method, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::{HealthProbe, HealthVerdict};
use crate::config::HealthConfig;
use crate::http::{self, Endpoint, HttpResponse};
use crate::platform::OrchestrationClient;
use crate::types::{InstanceId, ServiceIdentity};

/// Resolves instance addresses through the platform, then GETs the health path.
pub struct HttpHealthProbe<'a, C> {
    client: &'a C,
    service: ServiceIdentity,
    path: String,
    port: Option<u16>,
    timeout: Duration,
}

impl<'a, C: OrchestrationClient> HttpHealthProbe<'a, C> {
    pub fn new(client: &'a C, service: ServiceIdentity, config: &HealthConfig) -> Self {
        let path = if config.path.starts_with('/') {
            config.path.clone()
        } else {
            format!("/{}", config.path)
        };
        Self {
            client,
            service,
            path,
            port: config.port,
            timeout: config.timeout,
        }
    }

    async fn probe(&self, instance: &InstanceId) -> HealthVerdict {
        let info = match self.client.describe_instance(&self.service, instance).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(%instance, error = %e, "cannot describe instance");
                return HealthVerdict::Unknown;
            }
        };

        let Some(address) = info.address else {
            tracing::debug!(%instance, "instance has no address yet");
            return HealthVerdict::Unknown;
        };

        let endpoint = Endpoint::tcp(with_port(&address, self.port));
        match http::send(&endpoint, Method::GET, &self.path, None, self.timeout).await {
            Ok(response) => classify(&response),
            Err(e) => {
                tracing::warn!(%instance, %endpoint, error = %e, "health request failed");
                HealthVerdict::Unknown
            }
        }
    }
}

#[async_trait]
impl<'a, C: OrchestrationClient> HealthProbe for HttpHealthProbe<'a, C> {
    async fn check(&self, instance: &InstanceId) -> HealthVerdict {
        match tokio::time::timeout(self.timeout, self.probe(instance)).await {
            Ok(verdict) => verdict,
            Err(_elapsed) => {
                tracing::warn!(%instance, timeout = ?self.timeout, "health probe timed out");
                HealthVerdict::Unknown
            }
        }
    }
}

#[derive(Deserialize)]
struct HealthBody {
    status: String,
}

/// Apply the health endpoint contract to a response.
pub(crate) fn classify(response: &HttpResponse) -> HealthVerdict {
    if response.status != StatusCode::OK {
        return HealthVerdict::Unhealthy;
    }
    match response.json::<HealthBody>() {
        Ok(body) if body.status == "OK" => HealthVerdict::Healthy,
        _ => HealthVerdict::Unhealthy,
    }
}

/// Replace (or add) the port of a `host[:port]` address.
fn with_port(address: &str, port: Option<u16>) -> String {
    let Some(port) = port else {
        return address.to_string();
    };
    let host = match address.rsplit_once(':') {
        Some((host, p)) if p.parse::<u16>().is_ok() => host,
        _ => address,
    };
    format!("{host}:{port}")
}
