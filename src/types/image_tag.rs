// ABOUTME: The image tag requested on the command line.
// ABOUTME: Either an explicit tag or the "most recently built" sentinel.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_TAG_LEN: usize = 128;

/// Spelling of the sentinel when given explicitly on the command line.
pub const LATEST_BUILT: &str = "latest-built";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageTagError {
    #[error("image tag cannot be empty")]
    Empty,

    #[error("image tag exceeds maximum length of 128 characters")]
    TooLong,

    #[error("image tag cannot start with '{0}'")]
    InvalidStart(char),

    #[error("invalid character in image tag: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageTag {
    /// Whatever the build pipeline produced last.
    #[default]
    LatestBuilt,
    Explicit(String),
}

impl ImageTag {
    pub fn parse(input: &str) -> Result<Self, ImageTagError> {
        let input = input.trim();
        if input == LATEST_BUILT {
            return Ok(ImageTag::LatestBuilt);
        }

        let mut chars = input.chars();
        let first = chars.next().ok_or(ImageTagError::Empty)?;
        if input.len() > MAX_TAG_LEN {
            return Err(ImageTagError::TooLong);
        }
        if !(first.is_ascii_alphanumeric() || first == '_') {
            return Err(ImageTagError::InvalidStart(first));
        }
        if let Some(c) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
        {
            return Err(ImageTagError::InvalidChar(c));
        }

        Ok(ImageTag::Explicit(input.to_string()))
    }

    /// Resolve to a concrete tag, using `latest` for the sentinel.
    pub fn resolve<'a>(&'a self, latest: &'a str) -> &'a str {
        match self {
            ImageTag::LatestBuilt => latest,
            ImageTag::Explicit(tag) => tag,
        }
    }
}

impl FromStr for ImageTag {
    type Err = ImageTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageTag::LatestBuilt => f.write_str(LATEST_BUILT),
            ImageTag::Explicit(tag) => f.write_str(tag),
        }
    }
}
