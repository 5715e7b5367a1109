// ABOUTME: Orchestration platform abstraction and its HTTP implementation.
// ABOUTME: The deployment state machine only ever talks to OrchestrationClient.

mod client;
mod error;
mod http_client;
mod wire;

pub use client::{InstanceInfo, OrchestrationClient};
pub use error::{ErrorClass, PlatformError, is_transient_status};
pub use http_client::HttpPlatform;
