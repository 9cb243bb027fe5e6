//! Application configuration
//!
//! Built from defaults, then the environment, then command-line overrides.

use crate::common::UrlUtils;
use crate::error::{MirrorError, Result};
use crate::github::{DEFAULT_API_URL, DEFAULT_TRANSFER_REPO};
use crate::pipeline::DriverSettings;
use crate::registry::prober::{DEFAULT_DOCKER_HUB_API, DEFAULT_GHCR_URL};
use crate::workflow::RegistryCredentials;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REGION: &str = "cn-north-4";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(skip_serializing)]
    pub github_token: Option<String>,
    pub github_api: String,
    /// Owner of the transfer repository, looked up from the token when unset
    pub github_owner: Option<String>,
    pub transfer_repo: String,
    pub region: String,
    pub swr_username: String,
    #[serde(skip_serializing)]
    pub swr_password: String,
    /// Seconds between run status checks
    pub poll_interval: u64,
    pub max_poll_attempts: Option<u32>,
    /// HTTP timeout in seconds
    pub timeout: u64,
    pub ghcr_url: String,
    pub docker_hub_api: String,
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            github_api: DEFAULT_API_URL.to_string(),
            github_owner: None,
            transfer_repo: DEFAULT_TRANSFER_REPO.to_string(),
            region: DEFAULT_REGION.to_string(),
            swr_username: String::new(),
            swr_password: String::new(),
            poll_interval: 5,
            max_poll_attempts: None,
            timeout: 30,
            ghcr_url: DEFAULT_GHCR_URL.to_string(),
            docker_hub_api: DEFAULT_DOCKER_HUB_API.to_string(),
            verbose: false,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.region.is_empty()
            || !self
                .region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(MirrorError::Config(format!(
                "invalid region '{}', expected something like cn-north-4",
                self.region
            )));
        }
        if self.transfer_repo.trim().is_empty() {
            return Err(MirrorError::Config(
                "transfer repository name cannot be empty".to_string(),
            ));
        }
        if self.poll_interval == 0 {
            return Err(MirrorError::Config(
                "poll interval must be greater than 0".to_string(),
            ));
        }
        if self.max_poll_attempts == Some(0) {
            return Err(MirrorError::Config(
                "max poll attempts must be greater than 0".to_string(),
            ));
        }
        if self.timeout == 0 {
            return Err(MirrorError::Config(
                "timeout must be greater than 0".to_string(),
            ));
        }
        UrlUtils::parse_base(&self.github_api)?;
        UrlUtils::parse_base(&self.ghcr_url)?;
        UrlUtils::parse_base(&self.docker_hub_api)?;
        Ok(())
    }

    /// Create config from environment variables and defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("GITHUB_TOKEN").filter(|v| !v.is_empty()) {
            config.github_token = Some(val);
        }
        if let Some(val) = lookup("IMAGE_MIRROR_GITHUB_API") {
            config.github_api = val;
        }
        if let Some(val) = lookup("IMAGE_MIRROR_GITHUB_OWNER").filter(|v| !v.is_empty()) {
            config.github_owner = Some(val);
        }
        if let Some(val) = lookup("IMAGE_MIRROR_TRANSFER_REPO") {
            config.transfer_repo = val;
        }
        if let Some(val) = lookup("IMAGE_MIRROR_REGION") {
            config.region = val;
        }
        if let Some(val) = lookup("HUAWEICLOUD_USERNAME") {
            config.swr_username = val;
        }
        if let Some(val) = lookup("HUAWEICLOUD_PASSWORD") {
            config.swr_password = val;
        }
        if let Some(val) = lookup("IMAGE_MIRROR_POLL_INTERVAL") {
            if let Ok(interval) = val.parse() {
                config.poll_interval = interval;
            }
        }
        if let Some(val) = lookup("IMAGE_MIRROR_MAX_POLLS") {
            if let Ok(attempts) = val.parse() {
                config.max_poll_attempts = Some(attempts);
            }
        }
        if let Some(val) = lookup("IMAGE_MIRROR_TIMEOUT") {
            if let Ok(timeout) = val.parse() {
                config.timeout = timeout;
            }
        }
        if let Some(val) = lookup("IMAGE_MIRROR_GHCR_URL") {
            config.ghcr_url = val;
        }
        if let Some(val) = lookup("IMAGE_MIRROR_DOCKER_HUB_API") {
            config.docker_hub_api = val;
        }
        if let Some(val) = lookup("IMAGE_MIRROR_VERBOSE") {
            config.verbose = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Merge with another config, preferring non-default values
    pub fn merge(mut self, other: &AppConfig) -> Self {
        let default = AppConfig::default();

        if other.github_token.is_some() {
            self.github_token = other.github_token.clone();
        }
        if other.github_api != default.github_api {
            self.github_api = other.github_api.clone();
        }
        if other.github_owner.is_some() {
            self.github_owner = other.github_owner.clone();
        }
        if other.transfer_repo != default.transfer_repo {
            self.transfer_repo = other.transfer_repo.clone();
        }
        if other.region != default.region {
            self.region = other.region.clone();
        }
        if other.swr_username != default.swr_username {
            self.swr_username = other.swr_username.clone();
        }
        if other.swr_password != default.swr_password {
            self.swr_password = other.swr_password.clone();
        }
        if other.poll_interval != default.poll_interval {
            self.poll_interval = other.poll_interval;
        }
        if other.max_poll_attempts.is_some() {
            self.max_poll_attempts = other.max_poll_attempts;
        }
        if other.timeout != default.timeout {
            self.timeout = other.timeout;
        }
        if other.ghcr_url != default.ghcr_url {
            self.ghcr_url = other.ghcr_url.clone();
        }
        if other.docker_hub_api != default.docker_hub_api {
            self.docker_hub_api = other.docker_hub_api.clone();
        }
        if other.verbose != default.verbose {
            self.verbose = other.verbose;
        }

        self
    }

    pub fn credentials(&self) -> RegistryCredentials {
        RegistryCredentials::new(&self.swr_username, &self.swr_password)
    }

    pub fn driver_settings(&self) -> DriverSettings {
        DriverSettings::new(&self.region, self.credentials())
            .with_poll_interval(Duration::from_secs(self.poll_interval))
            .with_max_poll_attempts(self.max_poll_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transfer_repo, "myDockerHub");
        assert_eq!(config.region, "cn-north-4");
        assert_eq!(config.driver_settings().poll_interval, Duration::from_secs(5));
        assert_eq!(config.driver_settings().max_poll_attempts, None);
    }

    #[test]
    fn test_from_lookup() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GITHUB_TOKEN", "ghp_x"),
            ("IMAGE_MIRROR_REGION", "cn-east-3"),
            ("HUAWEICLOUD_USERNAME", "hwid@acme"),
            ("IMAGE_MIRROR_POLL_INTERVAL", "10"),
            ("IMAGE_MIRROR_MAX_POLLS", "not-a-number"),
            ("IMAGE_MIRROR_VERBOSE", "1"),
        ]));
        assert_eq!(config.github_token.as_deref(), Some("ghp_x"));
        assert_eq!(config.region, "cn-east-3");
        assert_eq!(config.poll_interval, 10);
        assert_eq!(config.max_poll_attempts, None);
        assert!(config.verbose);
        assert_eq!(
            config.driver_settings().credentials.login_username("cn-east-3"),
            "cn-east-3@acme"
        );
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let base = AppConfig::from_lookup(lookup(&[("IMAGE_MIRROR_REGION", "cn-east-3")]));
        let overrides = AppConfig {
            region: "ap-southeast-1".to_string(),
            ..AppConfig::default()
        };
        let merged = base.clone().merge(&overrides);
        assert_eq!(merged.region, "ap-southeast-1");

        let untouched = base.merge(&AppConfig::default());
        assert_eq!(untouched.region, "cn-east-3");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_region = AppConfig {
            region: "CN North".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(bad_region.validate(), Err(MirrorError::Config(_))));

        let zero_polls = AppConfig {
            max_poll_attempts: Some(0),
            ..AppConfig::default()
        };
        assert!(zero_polls.validate().is_err());

        let bad_api = AppConfig {
            github_api: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(bad_api.validate().is_err());
    }
}
