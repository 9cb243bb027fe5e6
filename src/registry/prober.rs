//! Source image existence prober
//!
//! Answers "does this source image exist, and is it from a trusted publisher"
//! before the pipeline commits to a CI run. Transport failures never escape
//! as errors: they become [`ExistenceCheck::Unknown`] with a logged warning.
//! A registry that answers with a status that says nothing about existence
//! yields [`ExistenceCheck::Rejected`], which the driver reports as is.

use crate::common::UrlUtils;
use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use crate::reference::{Dialect, ImageReference, DOCKER_HUB_REGISTRY};
use crate::registry::docker_hub::DockerHubClient;
use crate::registry::manifest::ManifestChecker;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_GHCR_URL: &str = "https://ghcr.io";
pub const DEFAULT_DOCKER_HUB_API: &str = "https://hub.docker.com";
pub const DEFAULT_DOCKER_REGISTRY_URL: &str = "https://registry-1.docker.io";
const USER_AGENT: &str = concat!("image-mirror/", env!("CARGO_PKG_VERSION"));

/// Outcome of an existence probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistenceCheck {
    Found { trusted: bool },
    NotFound,
    /// The registry could not be reached
    Unknown { reason: String },
    /// The registry answered, but with a status such as 403, 429 or 5xx
    Rejected { reason: String },
}

impl ExistenceCheck {
    pub fn exists(&self) -> bool {
        matches!(self, ExistenceCheck::Found { .. })
    }

    pub fn trusted(&self) -> bool {
        matches!(self, ExistenceCheck::Found { trusted: true })
    }
}

/// Collaborator that checks a source reference against its registry
#[async_trait]
pub trait ExistenceProber: Send + Sync {
    async fn probe(&self, reference: &ImageReference, dialect: Dialect) -> ExistenceCheck;
}

pub struct RegistryProberBuilder {
    ghcr_url: String,
    docker_hub_api: String,
    docker_registry_url: String,
    timeout: u64,
    output: Logger,
}

impl Default for RegistryProberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryProberBuilder {
    pub fn new() -> Self {
        Self {
            ghcr_url: DEFAULT_GHCR_URL.to_string(),
            docker_hub_api: DEFAULT_DOCKER_HUB_API.to_string(),
            docker_registry_url: DEFAULT_DOCKER_REGISTRY_URL.to_string(),
            timeout: 30,
            output: Logger::default(),
        }
    }

    pub fn with_ghcr_url(mut self, url: impl Into<String>) -> Self {
        self.ghcr_url = url.into();
        self
    }

    pub fn with_docker_hub_api(mut self, url: impl Into<String>) -> Self {
        self.docker_hub_api = url.into();
        self
    }

    pub fn with_docker_registry_url(mut self, url: impl Into<String>) -> Self {
        self.docker_registry_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_logger(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    pub fn build(self) -> Result<RegistryProber> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(self.timeout))
            .build()
            .map_err(|e| MirrorError::Network(format!("Failed to create registry client: {}", e)))?;

        let ghcr = ManifestChecker::new(
            client.clone(),
            UrlUtils::parse_base(&self.ghcr_url)?,
            self.output.clone(),
        );
        let docker_registry = ManifestChecker::new(
            client.clone(),
            UrlUtils::parse_base(&self.docker_registry_url)?,
            self.output.clone(),
        )
        .with_anonymous_pull();
        let docker_hub = DockerHubClient::new(
            client.clone(),
            UrlUtils::parse_base(&self.docker_hub_api)?,
            self.output.clone(),
        );

        Ok(RegistryProber {
            client,
            ghcr,
            docker_registry,
            docker_hub,
            output: self.output,
        })
    }
}

/// Prober backed by the real GHCR and Docker Hub endpoints
pub struct RegistryProber {
    client: Client,
    ghcr: ManifestChecker,
    docker_registry: ManifestChecker,
    docker_hub: DockerHubClient,
    output: Logger,
}

impl RegistryProber {
    pub fn builder() -> RegistryProberBuilder {
        RegistryProberBuilder::new()
    }

    async fn probe_ghcr(&self, reference: &ImageReference) -> Result<ExistenceCheck> {
        if reference.repository.split('/').count() != 2 {
            self.output.verbose(&format!(
                "GHCR reference {} is not namespace/repository, skipping lookup",
                reference.repository
            ));
            return Ok(ExistenceCheck::NotFound);
        }

        let status = self
            .ghcr
            .check(&reference.repository, reference.manifest_reference())
            .await?;
        Ok(if status.exists() {
            ExistenceCheck::Found { trusted: true }
        } else {
            ExistenceCheck::NotFound
        })
    }

    async fn probe_docker_hub(&self, reference: &ImageReference) -> Result<ExistenceCheck> {
        if reference.registry != DOCKER_HUB_REGISTRY {
            // Third-party registry typed into the Docker Hub field: no publisher signal
            let base = UrlUtils::parse_base(&format!("https://{}", reference.registry))?;
            let checker = ManifestChecker::new(self.client.clone(), base, self.output.clone());
            let status = checker
                .check(&reference.repository, reference.manifest_reference())
                .await?;
            return Ok(if status.exists() {
                ExistenceCheck::Found { trusted: false }
            } else {
                ExistenceCheck::NotFound
            });
        }

        let (namespace, name) = reference.namespace_and_name();
        let trusted = DockerHubClient::is_official(namespace);

        let exists = match &reference.digest {
            Some(digest) => self
                .docker_registry
                .check(&format!("{}/{}", namespace, name), digest)
                .await?
                .exists(),
            None => {
                self.docker_hub
                    .tag_exists(namespace, name, &reference.tag)
                    .await?
            }
        };

        Ok(if exists {
            ExistenceCheck::Found { trusted }
        } else {
            ExistenceCheck::NotFound
        })
    }
}

#[async_trait]
impl ExistenceProber for RegistryProber {
    async fn probe(&self, reference: &ImageReference, dialect: Dialect) -> ExistenceCheck {
        self.output.verbose(&format!(
            "Probing {} for {}",
            dialect.display_name(),
            reference
        ));

        let outcome = match dialect {
            Dialect::Ghcr => self.probe_ghcr(reference).await,
            Dialect::DockerHub => self.probe_docker_hub(reference).await,
        };

        match outcome {
            Ok(check) => {
                self.output.debug(&format!("Probe result for {}: {:?}", reference, check));
                check
            }
            Err(MirrorError::Registry(reason)) => {
                self.output
                    .warning(&format!("Registry refused to check {}: {}", reference, reason));
                ExistenceCheck::Rejected { reason }
            }
            Err(e) => {
                self.output
                    .warning(&format!("Failed to check source image {}: {}", reference, e));
                ExistenceCheck::Unknown {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::validate_image_address;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PULL_TOKEN: &str = "pull-token";

    /// Minimal registry: bearer challenge, token endpoint, and manifests that
    /// exist only for `library/present`. `/v2/broken/` always answers 503.
    async fn spawn_registry() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let realm = format!("{}/token", base);

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let realm = realm.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let mut read = 0;
                    while read < buf.len() {
                        let n = stream.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    let request = String::from_utf8_lossy(&buf[..read]).to_string();
                    let response = registry_response(&request, &realm);
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        base
    }

    fn registry_response(request: &str, realm: &str) -> String {
        let authorized = request.lines().any(|line| {
            line.to_ascii_lowercase()
                .starts_with(&format!("authorization: bearer {}", PULL_TOKEN))
        });

        let (status, headers, body) = if request.starts_with("GET /token") {
            if request.contains("scope=repository%3Alibrary%2F") {
                ("200 OK", String::new(), format!(r#"{{"token":"{}"}}"#, PULL_TOKEN))
            } else {
                ("400 Bad Request", String::new(), String::new())
            }
        } else if request.contains("/v2/broken/") {
            ("503 Service Unavailable", String::new(), String::new())
        } else if !authorized {
            (
                "401 Unauthorized",
                format!(
                    "WWW-Authenticate: Bearer realm=\"{}\",service=\"registry.test\"\r\n",
                    realm
                ),
                String::new(),
            )
        } else if request.contains("/v2/library/present/") {
            ("200 OK", String::new(), String::new())
        } else {
            ("404 Not Found", String::new(), String::new())
        };

        format!(
            "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            headers,
            body.len(),
            body
        )
    }

    fn digest_reference(name: &str) -> ImageReference {
        let address = format!("{}@sha256:{}", name, "a".repeat(64));
        validate_image_address(&address, Dialect::DockerHub).unwrap()
    }

    #[test]
    fn test_existence_check_flags() {
        assert!(ExistenceCheck::Found { trusted: true }.trusted());
        assert!(ExistenceCheck::Found { trusted: false }.exists());
        assert!(!ExistenceCheck::Found { trusted: false }.trusted());
        assert!(!ExistenceCheck::NotFound.exists());
        assert!(!ExistenceCheck::Unknown { reason: "dns".into() }.exists());
    }

    #[tokio::test]
    async fn test_unreachable_registry_collapses_to_unknown() {
        // Port 9 (discard) on localhost refuses connections on test hosts
        let prober = RegistryProber::builder()
            .with_ghcr_url("http://127.0.0.1:9")
            .with_timeout(5)
            .with_logger(Logger::new_quiet())
            .build()
            .unwrap();
        let reference = validate_image_address("owner/repo:v1", Dialect::Ghcr).unwrap();

        let check = prober.probe(&reference, Dialect::Ghcr).await;
        assert!(matches!(check, ExistenceCheck::Unknown { .. }));
    }

    #[tokio::test]
    async fn test_ghcr_depth_short_circuits_without_network() {
        let prober = RegistryProber::builder()
            .with_ghcr_url("http://127.0.0.1:9")
            .with_logger(Logger::new_quiet())
            .build()
            .unwrap();
        let reference = ImageReference {
            registry: "ghcr.io".to_string(),
            repository: "owner/repo/extra".to_string(),
            tag: "latest".to_string(),
            digest: None,
            tag_explicit: false,
            full_address: "owner/repo/extra".to_string(),
        };

        assert_eq!(
            prober.probe(&reference, Dialect::Ghcr).await,
            ExistenceCheck::NotFound
        );
    }

    #[tokio::test]
    async fn test_docker_hub_digest_uses_anonymous_token() {
        let base = spawn_registry().await;
        let prober = RegistryProber::builder()
            .with_docker_registry_url(&base)
            .with_timeout(5)
            .with_logger(Logger::new_quiet())
            .build()
            .unwrap();

        assert_eq!(
            prober.probe(&digest_reference("present"), Dialect::DockerHub).await,
            ExistenceCheck::Found { trusted: true }
        );
        assert_eq!(
            prober.probe(&digest_reference("missing"), Dialect::DockerHub).await,
            ExistenceCheck::NotFound
        );
    }

    #[tokio::test]
    async fn test_unexpected_status_is_rejected_not_missing() {
        let base = spawn_registry().await;
        let prober = RegistryProber::builder()
            .with_ghcr_url(&base)
            .with_timeout(5)
            .with_logger(Logger::new_quiet())
            .build()
            .unwrap();
        let reference = validate_image_address("broken/app:v1", Dialect::Ghcr).unwrap();

        match prober.probe(&reference, Dialect::Ghcr).await {
            ExistenceCheck::Rejected { reason } => {
                assert!(reason.contains("Registry unavailable"), "{}", reason)
            }
            other => panic!("expected a rejected check, got {:?}", other),
        }
    }
}
