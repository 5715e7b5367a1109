// ABOUTME: Image repository names and fully tagged image references.
// ABOUTME: The repository comes from config, the tag from the command line.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image repository cannot be empty")]
    Empty,

    #[error("invalid character in image repository: {0}")]
    InvalidChar(char),

    #[error("image repository must not carry a tag or digest: {0}")]
    TagNotAllowed(String),

    #[error("invalid image repository format: {0}")]
    InvalidFormat(String),
}

/// An untagged repository such as `registry.example.com:5000/team/web`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRepository {
    registry: Option<String>,
    path: String,
}

impl ImageRepository {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '-' | '_' | '@')))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        if input.contains('@') {
            return Err(ParseImageRefError::TagNotAllowed(input.to_string()));
        }

        // A first component containing '.' or ':' (or "localhost") is a registry host.
        let (registry, path) = match input.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), rest)
            }
            _ => (None, input),
        };

        // Any colon left in the path is a tag.
        if path.contains(':') {
            return Err(ParseImageRefError::TagNotAllowed(input.to_string()));
        }

        if path.split('/').any(str::is_empty) {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        Ok(Self {
            registry,
            path: path.to_string(),
        })
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Attach a tag, producing a deployable reference.
    pub fn with_tag(&self, tag: &str) -> ImageRef {
        ImageRef {
            repository: self.clone(),
            tag: tag.to_string(),
        }
    }
}

impl fmt::Display for ImageRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{}/", registry)?;
        }
        f.write_str(&self.path)
    }
}

/// A repository plus tag, the unit a revision is registered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    repository: ImageRepository,
    tag: String,
}

impl ImageRef {
    pub fn repository(&self) -> &ImageRepository {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}
