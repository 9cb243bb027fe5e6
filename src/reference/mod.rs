//! Image reference model for the two supported source registries
//!
//! This module defines the parsed [`ImageReference`], the source [`Dialect`]
//! and the error taxonomy of the reference grammar. The validators
//! themselves live in [`grammar`].

pub mod grammar;

pub use grammar::{
    normalize_source_input, validate_image_address, validate_optional_tag,
    validate_repository_name, validate_tag, SourceInput,
};

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DOCKER_HUB_REGISTRY: &str = "docker.io";
pub const GHCR_REGISTRY: &str = "ghcr.io";
pub const DEFAULT_TAG: &str = "latest";

/// Which source registry's grammar and API applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    DockerHub,
    Ghcr,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::DockerHub => "dockerhub",
            Dialect::Ghcr => "ghcr",
        }
    }

    /// Human readable registry name used in messages and workflow step names
    pub fn display_name(&self) -> &'static str {
        match self {
            Dialect::DockerHub => "Docker Hub",
            Dialect::Ghcr => "GitHub Container Registry",
        }
    }

    pub fn default_registry(&self) -> &'static str {
        match self {
            Dialect::DockerHub => DOCKER_HUB_REGISTRY,
            Dialect::Ghcr => GHCR_REGISTRY,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dockerhub" | "docker" | "docker.io" => Ok(Dialect::DockerHub),
            "ghcr" | "ghcr.io" => Ok(Dialect::Ghcr),
            other => Err(format!(
                "unknown source type '{}', expected one of: dockerhub, ghcr",
                other
            )),
        }
    }
}

/// A validated image reference. Rebuilt from text on every input change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
    pub digest: Option<String>,
    /// Whether the tag was typed by the caller rather than defaulted
    pub tag_explicit: bool,
    /// Normalized input text this reference was parsed from
    pub full_address: String,
}

impl ImageReference {
    /// Address handed to `docker pull` for this reference
    pub fn pull_reference(&self) -> String {
        let name = if self.registry == DOCKER_HUB_REGISTRY {
            self.repository.clone()
        } else {
            format!("{}/{}", self.registry, self.repository)
        };

        match (&self.digest, self.tag_explicit) {
            (Some(digest), true) => format!("{}:{}@{}", name, self.tag, digest),
            (Some(digest), false) => format!("{}@{}", name, digest),
            (None, _) => format!("{}:{}", name, self.tag),
        }
    }

    /// Namespace and bare repository name, `library` for official short names
    pub fn namespace_and_name(&self) -> (&str, &str) {
        match self.repository.rsplit_once('/') {
            Some((namespace, name)) => (namespace, name),
            None => ("library", self.repository.as_str()),
        }
    }

    /// Tag or digest used when addressing the manifest endpoint
    pub fn manifest_reference(&self) -> &str {
        self.digest.as_deref().unwrap_or(&self.tag)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pull_reference())
    }
}

/// Reasons a repository name segment is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("repository name cannot be empty")]
    Empty,
    #[error("repository name cannot exceed {max} characters")]
    TooLong { max: usize },
    #[error("repository name must be lowercase")]
    Uppercase,
    #[error("repository name may only contain lowercase letters, digits, '-', '_' and '.'")]
    InvalidCharacters,
    #[error("repository name cannot start or end with '-', '_' or '.'")]
    BoundarySeparator,
    #[error("repository name cannot contain consecutive separators")]
    ConsecutiveSeparators,
    #[error("repository path contains an empty segment")]
    EmptySegment,
}

/// Reasons a tag is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("tag cannot be empty")]
    Empty,
    #[error("tag cannot exceed {max} characters")]
    TooLong { max: usize },
    #[error(
        "tag may only contain letters, digits, '_', '.' and '-', and must start with a letter, digit or '_'"
    )]
    Malformed,
}

/// Field-scoped validation failure of the reference grammar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("image address cannot be empty")]
    EmptyAddress,
    #[error("malformed image address '{0}', expected [registry/]namespace/repository[:tag]")]
    Malformed(String),
    #[error("invalid registry host '{0}'")]
    InvalidRegistry(String),
    #[error("invalid digest '{0}', expected algorithm:encoded")]
    InvalidDigest(String),
    #[error("GHCR image address must be exactly namespace/repository[:tag]")]
    GhcrDepth,
    #[error("malformed GHCR image address '{0}', expected namespace/repository[:tag]")]
    GhcrMalformed(String),
    #[error("invalid repository name: {0}")]
    Repository(#[from] NameError),
    #[error("invalid tag: {0}")]
    Tag(#[from] TagError),
}

/// Flat validation outcome, as shown next to an input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
    pub parsed: Option<ImageReference>,
}

impl From<std::result::Result<ImageReference, ReferenceError>> for ValidationResult {
    fn from(result: std::result::Result<ImageReference, ReferenceError>) -> Self {
        match result {
            Ok(parsed) => Self {
                is_valid: true,
                error: None,
                parsed: Some(parsed),
            },
            Err(err) => Self {
                is_valid: false,
                error: Some(err.to_string()),
                parsed: None,
            },
        }
    }
}

impl From<std::result::Result<(), ReferenceError>> for ValidationResult {
    fn from(result: std::result::Result<(), ReferenceError>) -> Self {
        Self {
            is_valid: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
            parsed: None,
        }
    }
}

/// Registry host of the mirror target for a region
pub fn swr_registry_host(region: &str) -> String {
    format!("swr.{}.myhuaweicloud.com", region)
}

/// Final target address shown to the user before submission
pub fn target_reference(region: &str, namespace: &str, repository: &str, tag: &str) -> String {
    let tag = tag.trim();
    format!(
        "{}/{}/{}:{}",
        swr_registry_host(region),
        namespace,
        repository,
        if tag.is_empty() { "[tag]" } else { tag }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("dockerhub".parse::<Dialect>(), Ok(Dialect::DockerHub));
        assert_eq!("GHCR".parse::<Dialect>(), Ok(Dialect::Ghcr));
        assert!("quay".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_target_reference() {
        assert_eq!(
            target_reference("cn-north-4", "team", "nginx", "alpine"),
            "swr.cn-north-4.myhuaweicloud.com/team/nginx:alpine"
        );
        assert_eq!(
            target_reference("cn-east-3", "team", "nginx", " "),
            "swr.cn-east-3.myhuaweicloud.com/team/nginx:[tag]"
        );
    }

    #[test]
    fn test_validation_result_from_error() {
        let result = ValidationResult::from(validate_image_address("", Dialect::DockerHub));
        assert!(!result.is_valid);
        assert_eq!(result.error.as_deref(), Some("image address cannot be empty"));
        assert!(result.parsed.is_none());
    }
}
