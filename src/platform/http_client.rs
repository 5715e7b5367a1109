// ABOUTME: OrchestrationClient speaking the vendor-neutral HTTP/JSON API.
// ABOUTME: Owns the retry policy for transient failures and the stability poll loop.

use async_trait::async_trait;
use hyper::{Method, StatusCode};
use serde::de::DeserializeOwned;
use snafu::ResultExt;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;
use urlencoding::encode;

use super::client::{InstanceInfo, OrchestrationClient};
use super::error::{
    EndpointSnafu, MalformedResponseSnafu, MalformedTemplateSnafu, PlatformError,
    UnreachableSnafu, is_transient_status,
};
use super::wire::{
    InstanceBody, InstanceList, RegisterRevisionRequest, RegisterRevisionResponse, ServiceBody,
    ServiceStatus, UpdateServiceRequest, error_message,
};
use crate::config::{PlatformConfig, RevisionTemplate};
use crate::http::{self, Endpoint, HttpResponse};
use crate::types::{ImageRef, InstanceId, RevisionId, ServiceIdentity};

/// Which transient failures a request may be repeated after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    Idempotent,
    /// Only when the platform provably did not act on it.
    UnlessDelivered,
}

/// Client for a platform reachable over HTTP or a unix socket.
#[derive(Debug, Clone)]
pub struct HttpPlatform {
    endpoint: Endpoint,
    config: PlatformConfig,
}

impl HttpPlatform {
    pub fn new(config: &PlatformConfig) -> Result<Self, PlatformError> {
        let endpoint = Endpoint::parse(&config.endpoint).context(EndpointSnafu)?;
        Ok(Self {
            endpoint,
            config: config.clone(),
        })
    }

    fn service_path(service: &ServiceIdentity) -> String {
        format!(
            "/v1/clusters/{}/services/{}",
            encode(service.cluster().as_str()),
            encode(service.service().as_str())
        )
    }

    /// Send a request, repeating it while it fails transiently.
    async fn call(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        retry: Retry,
    ) -> Result<HttpResponse, PlatformError> {
        let attempts = self.config.retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = self
                .call_once(
                    operation,
                    method.clone(),
                    path,
                    body.clone(),
                    self.config.request_timeout,
                )
                .await;

            let e = match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };

            if retry == Retry::UnlessDelivered && !e.is_undelivered() {
                tracing::warn!(
                    operation,
                    error = %e,
                    "platform may have applied the request, not retrying"
                );
                return Err(e);
            }
            if attempt >= attempts {
                return Err(PlatformError::RetriesExhausted {
                    operation,
                    attempts: attempt,
                    source: Box::new(e),
                });
            }

            tracing::warn!(
                operation,
                attempt,
                max_attempts = attempts,
                error = %e,
                "transient platform error, retrying"
            );
            tokio::time::sleep(self.config.retry_backoff).await;
        }
    }

    /// Single exchange. Transient statuses become errors; others are left to the caller.
    async fn call_once(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        timeout: Duration,
    ) -> Result<HttpResponse, PlatformError> {
        tracing::debug!(operation, %method, path, "platform request");
        let response = http::send(&self.endpoint, method, path, body, timeout)
            .await
            .context(UnreachableSnafu { operation })?;

        if is_transient_status(response.status.as_u16()) {
            return Err(status_error(operation, &response));
        }
        Ok(response)
    }

    async fn service_status(
        &self,
        service: &ServiceIdentity,
        timeout: Duration,
    ) -> Result<ServiceStatus, PlatformError> {
        let operation = "wait_until_stable";
        let path = format!("{}/status", Self::service_path(service));
        let response = self
            .call_once(operation, Method::GET, &path, None, timeout)
            .await?;
        if response.status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound {
                what: "service",
                name: service.to_string(),
            });
        }
        expect_success(operation, &response)?;
        parse(operation, &response)
    }
}

#[async_trait]
impl OrchestrationClient for HttpPlatform {
    async fn current_revision(
        &self,
        service: &ServiceIdentity,
    ) -> Result<Option<RevisionId>, PlatformError> {
        let operation = "current_revision";
        let response = self
            .call(
                operation,
                Method::GET,
                &Self::service_path(service),
                None,
                Retry::Idempotent,
            )
            .await?;

        if response.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        expect_success(operation, &response)?;
        let body: ServiceBody = parse(operation, &response)?;
        Ok(body.revision)
    }

    async fn register_revision(
        &self,
        image: &ImageRef,
        template: &RevisionTemplate,
    ) -> Result<RevisionId, PlatformError> {
        let operation = "register_revision";
        let resolved = template.resolve().context(MalformedTemplateSnafu)?;
        let body = serde_json::to_vec(&RegisterRevisionRequest::new(image, &resolved))
            .map_err(|e| PlatformError::fatal(format!("cannot encode revision: {e}")))?;

        let response = self
            .call(
                operation,
                Method::POST,
                "/v1/revisions",
                Some(body),
                Retry::UnlessDelivered,
            )
            .await?;

        if matches!(
            response.status,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            return Err(PlatformError::RegistrationRejected {
                message: error_message(&response.body),
            });
        }
        expect_success(operation, &response)?;
        let body: RegisterRevisionResponse = parse(operation, &response)?;
        Ok(body.revision)
    }

    async fn update_service(
        &self,
        service: &ServiceIdentity,
        revision: &RevisionId,
    ) -> Result<(), PlatformError> {
        let operation = "update_service";
        let body = serde_json::to_vec(&UpdateServiceRequest { revision })
            .map_err(|e| PlatformError::fatal(format!("cannot encode update: {e}")))?;

        let response = self
            .call(
                operation,
                Method::PUT,
                &Self::service_path(service),
                Some(body),
                Retry::Idempotent,
            )
            .await?;

        if response.status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound {
                what: "service or revision",
                name: format!("{service} -> {revision}"),
            });
        }
        expect_success(operation, &response)
    }

    async fn wait_until_stable(
        &self,
        service: &ServiceIdentity,
        timeout: Duration,
    ) -> Result<bool, PlatformError> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let request_timeout = self
                .config
                .request_timeout
                .min(remaining.max(Duration::from_millis(1)));

            match self.service_status(service, request_timeout).await {
                Ok(status) if status.is_stable() => {
                    tracing::info!(%service, "service stable");
                    return Ok(true);
                }
                Ok(status) => {
                    tracing::debug!(
                        %service,
                        desired = status.desired_count,
                        instances = status.instances.len(),
                        "service not stable yet"
                    );
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(%service, error = %e, "status poll failed, will retry");
                }
                Err(e) => return Err(e),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(%service, ?timeout, "service did not stabilize in time");
                return Ok(false);
            }
            tokio::time::sleep(self.config.poll_interval.min(remaining)).await;
        }
    }

    async fn list_running_instances(
        &self,
        service: &ServiceIdentity,
    ) -> Result<BTreeSet<InstanceId>, PlatformError> {
        let operation = "list_running_instances";
        let path = format!("{}/instances", Self::service_path(service));
        let response = self
            .call(operation, Method::GET, &path, None, Retry::Idempotent)
            .await?;

        if response.status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound {
                what: "service",
                name: service.to_string(),
            });
        }
        expect_success(operation, &response)?;
        let list: InstanceList = parse(operation, &response)?;
        Ok(list
            .instances
            .into_iter()
            .filter(InstanceBody::is_running)
            .map(|i| i.id)
            .collect())
    }

    async fn describe_instance(
        &self,
        service: &ServiceIdentity,
        instance: &InstanceId,
    ) -> Result<InstanceInfo, PlatformError> {
        let operation = "describe_instance";
        let path = format!(
            "{}/instances/{}",
            Self::service_path(service),
            encode(instance.as_str())
        );
        let response = self
            .call(operation, Method::GET, &path, None, Retry::Idempotent)
            .await?;

        if response.status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound {
                what: "instance",
                name: instance.to_string(),
            });
        }
        expect_success(operation, &response)?;
        let body: InstanceBody = parse(operation, &response)?;
        Ok(body.into())
    }
}

fn status_error(operation: &'static str, response: &HttpResponse) -> PlatformError {
    PlatformError::Status {
        operation,
        status: response.status.as_u16(),
        message: error_message(&response.body),
    }
}

fn expect_success(operation: &'static str, response: &HttpResponse) -> Result<(), PlatformError> {
    if response.status.is_success() {
        Ok(())
    } else {
        Err(status_error(operation, response))
    }
}

fn parse<T: DeserializeOwned>(
    operation: &'static str,
    response: &HttpResponse,
) -> Result<T, PlatformError> {
    response.json().context(MalformedResponseSnafu { operation })
}
