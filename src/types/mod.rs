// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to keep revision and instance handles apart.

mod id;
mod image_ref;
mod image_tag;
mod service_identity;
mod service_name;

pub use id::{Id, InstanceId, RevisionId};
pub use image_ref::{ImageRef, ImageRepository, ParseImageRefError};
pub use image_tag::{ImageTag, ImageTagError, LATEST_BUILT};
pub use service_identity::ServiceIdentity;
pub use service_name::{ClusterName, NameError, ServiceName};
