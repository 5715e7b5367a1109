// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Validates names and image repositories while parsing.

use nonempty::NonEmpty;
use serde::Deserialize;

use crate::types::{ClusterName, ImageRepository, ImageTag, ServiceName};

pub fn deserialize_cluster_name<'de, D>(deserializer: D) -> Result<Option<ClusterName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| ClusterName::new(&s).map_err(serde::de::Error::custom))
        .transpose()
}

pub fn deserialize_service_name<'de, D>(deserializer: D) -> Result<Option<ServiceName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| ServiceName::new(&s).map_err(serde::de::Error::custom))
        .transpose()
}

pub fn deserialize_image_repository<'de, D>(deserializer: D) -> Result<ImageRepository, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ImageRepository::parse(&s).map_err(serde::de::Error::custom)
}

/// A concrete tag; the "latest built" sentinel cannot stand in for itself.
pub fn deserialize_latest_tag<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match ImageTag::parse(&s).map_err(serde::de::Error::custom)? {
        ImageTag::Explicit(tag) => Ok(tag),
        ImageTag::LatestBuilt => Err(serde::de::Error::custom(format!(
            "latest_tag must be a concrete tag, not '{s}'"
        ))),
    }
}

/// Accepts `command: ./smoke.sh` or `command: [./smoke.sh, --fast]`.
pub fn deserialize_command<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let argv = match CommandEntry::deserialize(deserializer)? {
        CommandEntry::Line(program) => vec![program],
        CommandEntry::Argv(argv) => argv,
    };

    NonEmpty::from_vec(argv)
        .filter(|argv| !argv.head.trim().is_empty())
        .ok_or_else(|| serde::de::Error::custom("command cannot be empty"))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommandEntry {
    Line(String),
    Argv(Vec<String>),
}
