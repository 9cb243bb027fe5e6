//! Common utilities and helper functions
//!
//! This module provides reusable utility functions that can be used across the codebase
//! to reduce code duplication and improve maintainability.

use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use url::Url;

/// Timing utilities
pub struct Timer {
    start: Instant,
    description: String,
}

impl Timer {
    /// Start a new timer
    pub fn start(description: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            description: description.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log elapsed time using provided logger
    pub fn log_elapsed(&self, logger: &Logger) {
        logger.info(&format!(
            "{} finished in {}",
            self.description,
            logger.format_duration(self.elapsed())
        ));
    }
}

/// URL construction for REST endpoints
pub struct UrlUtils;

impl UrlUtils {
    /// Parse a configured API base URL
    pub fn parse_base(base: &str) -> Result<Url> {
        let url = Url::parse(base)?;
        if url.cannot_be_a_base() {
            return Err(MirrorError::Config(format!(
                "URL cannot be used as an API base: {}",
                base
            )));
        }
        Ok(url)
    }

    /// Append path segments to a base URL. Segments may contain `/`, which
    /// splits them further; every piece is percent-encoded.
    pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
        let mut url = base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                MirrorError::Config(format!("URL cannot be used as an API base: {}", base))
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.extend(segment.split('/').filter(|s| !s.is_empty()));
            }
        }
        Ok(url)
    }
}

/// SHA256 content fingerprints
pub struct DigestUtils;

impl DigestUtils {
    /// Compute lowercase hex SHA256 of byte data
    pub fn compute_sha256(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Compute lowercase hex SHA256 of string data
    pub fn compute_sha256_str(data: &str) -> String {
        Self::compute_sha256(data.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_sha256() {
        let digest = DigestUtils::compute_sha256_str("hello world");
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = UrlUtils::parse_base("https://ghe.example.com/api/v3").unwrap();
        let url = UrlUtils::endpoint(&base, &["repos", "octo", "myDockerHub", "dispatches"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/octo/myDockerHub/dispatches"
        );
    }

    #[test]
    fn test_endpoint_splits_nested_segments() {
        let base = UrlUtils::parse_base("https://ghcr.io").unwrap();
        let url = UrlUtils::endpoint(&base, &["v2", "owner/repo", "manifests", "v1.0"]).unwrap();
        assert_eq!(url.as_str(), "https://ghcr.io/v2/owner/repo/manifests/v1.0");
    }

    #[test]
    fn test_parse_base_rejects_non_base() {
        assert!(UrlUtils::parse_base("mailto:someone@example.com").is_err());
        assert!(UrlUtils::parse_base("not a url").is_err());
    }
}
