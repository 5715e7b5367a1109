// ABOUTME: Minimal HTTP/1 client over TCP or a unix socket, built on hyper's conn API.
// ABOUTME: Shared by the platform client and the HTTP health probe.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpStream, UnixStream};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("connect to {target} failed: {reason}")]
    Connect { target: String, reason: String },

    #[error("HTTP handshake failed: {0}")]
    Handshake(String),

    #[error("failed to build request: {0}")]
    Build(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl HttpError {
    /// Failures where nothing reached the server or the exchange was cut short.
    pub fn is_connection_level(&self) -> bool {
        !matches!(self, HttpError::InvalidEndpoint(_) | HttpError::Build(_))
    }

    /// Failed before any request bytes were written.
    pub fn is_before_send(&self) -> bool {
        matches!(self, HttpError::Connect { .. } | HttpError::Handshake(_))
    }
}

/// Where requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { authority: String },
    Unix { path: PathBuf },
}

impl Endpoint {
    /// Parse `http://host[:port]` or `unix:///path/to.sock`.
    pub fn parse(input: &str) -> Result<Self, HttpError> {
        let input = input.trim();
        if let Some(path) = input.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(HttpError::InvalidEndpoint(input.to_string()));
            }
            return Ok(Endpoint::Unix {
                path: PathBuf::from(path),
            });
        }

        let uri: Uri = input
            .parse()
            .map_err(|e| HttpError::InvalidEndpoint(format!("{input}: {e}")))?;

        if uri.scheme_str() != Some("http") {
            return Err(HttpError::InvalidEndpoint(format!(
                "{input}: only http:// and unix:// endpoints are supported"
            )));
        }

        if !matches!(uri.path(), "" | "/") {
            return Err(HttpError::InvalidEndpoint(format!(
                "{input}: endpoint must not carry a path"
            )));
        }

        let host = uri
            .host()
            .ok_or_else(|| HttpError::InvalidEndpoint(format!("{input}: missing host")))?;
        let port = uri.port_u16().unwrap_or(80);

        Ok(Endpoint::tcp(format!("{host}:{port}")))
    }

    pub fn tcp(authority: impl Into<String>) -> Self {
        Endpoint::Tcp {
            authority: authority.into(),
        }
    }

    fn host_header(&self) -> &str {
        match self {
            Endpoint::Tcp { authority } => authority,
            Endpoint::Unix { .. } => "localhost",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Tcp { authority } => write!(f, "http://{authority}"),
            Endpoint::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Send one request on a fresh connection and buffer the response.
///
/// The whole exchange (connect, handshake, send, body) is bounded by `timeout`.
pub async fn send(
    endpoint: &Endpoint,
    method: Method,
    path: &str,
    body: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<HttpResponse, HttpError> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(HOST, endpoint.host_header());
    if body.is_some() {
        builder = builder.header(CONTENT_TYPE, "application/json");
    }
    let request = builder
        .body(Full::new(Bytes::from(body.unwrap_or_default())))
        .map_err(|e| HttpError::Build(e.to_string()))?;

    tokio::time::timeout(timeout, dispatch(endpoint, request))
        .await
        .map_err(|_elapsed| HttpError::Timeout(timeout))?
}

async fn dispatch(
    endpoint: &Endpoint,
    request: Request<Full<Bytes>>,
) -> Result<HttpResponse, HttpError> {
    match endpoint {
        Endpoint::Tcp { authority } => {
            let stream =
                TcpStream::connect(authority.as_str())
                    .await
                    .map_err(|e| HttpError::Connect {
                        target: authority.clone(),
                        reason: e.to_string(),
                    })?;
            exchange(TokioIo::new(stream), request).await
        }
        Endpoint::Unix { path } => {
            let stream = UnixStream::connect(path)
                .await
                .map_err(|e| HttpError::Connect {
                    target: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            exchange(TokioIo::new(stream), request).await
        }
    }
}

async fn exchange<T>(io: T, request: Request<Full<Bytes>>) -> Result<HttpResponse, HttpError>
where
    T: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| HttpError::Handshake(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "http connection closed with error");
        }
    });

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| HttpError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| HttpError::Body(e.to_string()))?
        .to_bytes();

    Ok(HttpResponse { status, body })
}
