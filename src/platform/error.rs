// ABOUTME: Platform error types with SNAFU pattern.
// ABOUTME: Every failure is classified transient or fatal at the client boundary.

use snafu::Snafu;

use crate::config::TemplateError;
use crate::http::HttpError;

/// How a caller should treat a platform failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Might succeed if repeated (connection reset, 503, throttling).
    Transient,
    /// Repeating the call will not help.
    Fatal,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PlatformError {
    #[snafu(display("invalid platform endpoint: {source}"))]
    Endpoint { source: HttpError },

    #[snafu(display("platform unreachable during {operation}: {source}"))]
    Unreachable {
        operation: &'static str,
        source: HttpError,
    },

    #[snafu(display("{operation} failed with HTTP {status}: {message}"))]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[snafu(display("{operation} returned a malformed response: {source}"))]
    MalformedResponse {
        operation: &'static str,
        source: serde_json::Error,
    },

    #[snafu(display("malformed revision template: {source}"))]
    MalformedTemplate { source: TemplateError },

    #[snafu(display("revision registration rejected: {message}"))]
    RegistrationRejected { message: String },

    #[snafu(display("{what} not found: {name}"))]
    NotFound { what: &'static str, name: String },

    #[snafu(display("{operation} still failing after {attempts} attempts: {source}"))]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        source: Box<PlatformError>,
    },

    /// Escape hatch for other client implementations.
    #[snafu(display("{message}"))]
    Other { class: ErrorClass, message: String },
}

impl PlatformError {
    pub fn transient(message: impl Into<String>) -> Self {
        PlatformError::Other {
            class: ErrorClass::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        PlatformError::Other {
            class: ErrorClass::Fatal,
            message: message.into(),
        }
    }

    /// Returns the error class for retry decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            PlatformError::Unreachable { source, .. } if source.is_connection_level() => {
                ErrorClass::Transient
            }
            PlatformError::Status { status, .. } if is_transient_status(*status) => {
                ErrorClass::Transient
            }
            PlatformError::Other { class, .. } => *class,
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// The platform provably did not act on the request: it never arrived,
    /// or the platform throttled it.
    pub fn is_undelivered(&self) -> bool {
        match self {
            PlatformError::Unreachable { source, .. } => source.is_before_send(),
            PlatformError::Status { status, .. } => *status == 429,
            _ => false,
        }
    }
}

/// 408, 429 and every 5xx are worth repeating.
pub fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}
