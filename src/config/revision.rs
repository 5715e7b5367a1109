// ABOUTME: Revision template: everything about a revision except the image tag.
// ABOUTME: Validates ports, memory and env before anything is sent to the platform.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use super::deserialize::{deserialize_image_repository, deserialize_latest_tag};
use super::env_value::{EnvValue, resolve_env_map};
use crate::types::ImageRepository;

#[derive(Debug, Clone, Deserialize)]
pub struct RevisionTemplate {
    /// Revision family; each registration adds a new revision to it.
    pub family: String,

    /// Container name inside the revision. Defaults to the family.
    #[serde(default)]
    pub container: Option<String>,

    #[serde(deserialize_with = "deserialize_image_repository")]
    pub image: ImageRepository,

    /// Tag standing in for "most recently built".
    #[serde(
        default = "default_latest_tag",
        deserialize_with = "deserialize_latest_tag"
    )]
    pub latest_tag: String,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    #[serde(default)]
    pub ports: Vec<String>,

    #[serde(default)]
    pub command: Option<Vec<String>>,

    /// Fractional CPUs, e.g. "0.5".
    #[serde(default)]
    pub cpu: Option<String>,

    /// Memory limit, e.g. "512m" or "1g".
    #[serde(default)]
    pub memory: Option<String>,
}

fn default_latest_tag() -> String {
    "latest".to_string()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("revision family cannot be empty")]
    EmptyFamily,

    #[error("container name cannot be empty")]
    EmptyContainer,

    #[error("invalid port mapping: {0}")]
    InvalidPort(String),

    #[error("invalid cpu value: {0}")]
    InvalidCpu(String),

    #[error("invalid memory value: {0}")]
    InvalidMemory(String),

    #[error("cannot resolve env: {0}")]
    Env(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortMapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: Protocol,
}

/// A template with every field checked and resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTemplate {
    pub family: String,
    pub container: String,
    pub env: BTreeMap<String, String>,
    pub ports: Vec<PortMapping>,
    pub command: Option<Vec<String>>,
    pub cpu: Option<f64>,
    pub memory_mib: Option<u64>,
}

impl RevisionTemplate {
    pub fn container_name(&self) -> &str {
        self.container.as_deref().unwrap_or(&self.family)
    }

    /// Check and resolve the template. Fails on the first malformed field.
    pub fn resolve(&self) -> Result<ResolvedTemplate, TemplateError> {
        if self.family.trim().is_empty() {
            return Err(TemplateError::EmptyFamily);
        }
        if self.container_name().trim().is_empty() {
            return Err(TemplateError::EmptyContainer);
        }

        let ports = self
            .ports
            .iter()
            .map(|p| parse_port_mapping(p).ok_or_else(|| TemplateError::InvalidPort(p.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let cpu = match &self.cpu {
            Some(c) => Some(
                c.parse::<f64>()
                    .ok()
                    .filter(|v| *v > 0.0 && v.is_finite())
                    .ok_or_else(|| TemplateError::InvalidCpu(c.clone()))?,
            ),
            None => None,
        };

        let memory_mib = match &self.memory {
            Some(m) => Some(
                parse_memory_mib(m).ok_or_else(|| TemplateError::InvalidMemory(m.clone()))?,
            ),
            None => None,
        };

        let env = resolve_env_map(&self.env).map_err(|e| TemplateError::Env(e.to_string()))?;

        Ok(ResolvedTemplate {
            family: self.family.clone(),
            container: self.container_name().to_string(),
            env,
            ports,
            command: self.command.clone(),
            cpu,
            memory_mib,
        })
    }
}

/// Parse "80", "8080:80" or "8080:80/udp".
fn parse_port_mapping(spec: &str) -> Option<PortMapping> {
    let (ports, protocol) = match spec.split_once('/') {
        Some((ports, "tcp")) => (ports, Protocol::Tcp),
        Some((ports, "udp")) => (ports, Protocol::Udp),
        Some(_) => return None,
        None => (spec, Protocol::Tcp),
    };

    let (host_port, container_port) = match ports.split_once(':') {
        Some((host, container)) => (Some(host.parse().ok()?), container.parse().ok()?),
        None => (None, ports.parse().ok()?),
    };

    if container_port == 0 {
        return None;
    }

    Some(PortMapping {
        host_port,
        container_port,
        protocol,
    })
}

/// Parse "512m", "1g", "262144k" into whole MiB. Bare numbers are MiB.
fn parse_memory_mib(spec: &str) -> Option<u64> {
    let spec = spec.trim().to_ascii_lowercase();
    let (digits, to_mib): (&str, fn(u64) -> Option<u64>) =
        if let Some(n) = spec.strip_suffix('g') {
            (n, |v| v.checked_mul(1024))
        } else if let Some(n) = spec.strip_suffix('m') {
            (n, Some)
        } else if let Some(n) = spec.strip_suffix('k') {
            (n, |v| (v % 1024 == 0).then_some(v / 1024))
        } else {
            (spec.as_str(), Some)
        };

    digits.parse::<u64>().ok().and_then(to_mib).filter(|v| *v > 0)
}
