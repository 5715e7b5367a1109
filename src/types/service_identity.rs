// ABOUTME: The (cluster, service) pair a deployment acts on.
// ABOUTME: Immutable for the lifetime of one deployment attempt.

use std::fmt;

use super::service_name::{ClusterName, ServiceName};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceIdentity {
    cluster: ClusterName,
    service: ServiceName,
}

impl ServiceIdentity {
    pub fn new(cluster: ClusterName, service: ServiceName) -> Self {
        Self { cluster, service }
    }

    pub fn cluster(&self) -> &ClusterName {
        &self.cluster
    }

    pub fn service(&self) -> &ServiceName {
        &self.service
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cluster, self.service)
    }
}
