//! Manifest existence checks against a Docker Registry v2 endpoint
//!
//! Implements `HEAD /v2/{name}/manifests/{reference}` with a single `GET`
//! fallback for registries that answer `HEAD` with something unexpected.
//! Checkers built [`ManifestChecker::with_anonymous_pull`] first trade a
//! bearer challenge for an anonymous token.

use crate::common::UrlUtils;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::Result;
use crate::logging::Logger;
use crate::registry::auth::AuthChallenge;
use reqwest::header::WWW_AUTHENTICATE;
use reqwest::{Client, Method, Response, StatusCode};
use url::Url;

pub const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// What a manifest endpoint said about a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestStatus {
    Present,
    Missing,
    /// 401: the registry wants a token. Treated as present by the prober.
    AuthRequired,
}

impl ManifestStatus {
    /// Map a response status, `None` for statuses with no existence meaning
    pub fn from_status(status: StatusCode) -> Option<Self> {
        match status.as_u16() {
            200 => Some(ManifestStatus::Present),
            404 => Some(ManifestStatus::Missing),
            401 => Some(ManifestStatus::AuthRequired),
            _ => None,
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, ManifestStatus::Missing)
    }
}

#[derive(Clone)]
pub struct ManifestChecker {
    client: Client,
    base_url: Url,
    output: Logger,
    anonymous_pull: bool,
}

impl ManifestChecker {
    pub fn new(client: Client, base_url: Url, output: Logger) -> Self {
        Self {
            client,
            base_url,
            output,
            anonymous_pull: false,
        }
    }

    /// Answer a 401 bearer challenge with an anonymous pull token and ask again
    pub fn with_anonymous_pull(mut self) -> Self {
        self.anonymous_pull = true;
        self
    }

    /// Check whether `repository:reference` has a manifest in this registry
    pub async fn check(&self, repository: &str, reference: &str) -> Result<ManifestStatus> {
        let url = UrlUtils::endpoint(&self.base_url, &["v2", repository, "manifests", reference])?;
        self.output.verbose(&format!("Checking manifest: {}", url));

        let head = self.send(Method::HEAD, &url, None).await?;
        if head.status() == StatusCode::UNAUTHORIZED && self.anonymous_pull {
            if let Some(token) = self.anonymous_token(&head, repository).await? {
                let retry = self.send(Method::HEAD, &url, Some(token.as_str())).await?;
                return self.resolve(retry, &url, Some(token.as_str())).await;
            }
        }
        self.resolve(head, &url, None).await
    }

    /// Map a HEAD response, retrying once with GET when its status says
    /// nothing about existence
    async fn resolve(&self, head: Response, url: &Url, token: Option<&str>) -> Result<ManifestStatus> {
        let head_status = head.status();
        self.output
            .detail(&format!("HEAD {} -> {}", url, head_status));
        if let Some(status) = ManifestStatus::from_status(head_status) {
            return Ok(status);
        }

        self.output.verbose(&format!(
            "HEAD returned {}, retrying manifest check with GET",
            head_status
        ));
        let response = self.send(Method::GET, url, token).await?;
        let get_status = response.status();
        self.output.detail(&format!("GET {} -> {}", url, get_status));
        if let Some(status) = ManifestStatus::from_status(get_status) {
            return Ok(status);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        Err(HttpErrorHandler::handle_registry_error(
            get_status,
            &error_text,
            "manifest check",
        ))
    }

    async fn anonymous_token(&self, response: &Response, repository: &str) -> Result<Option<String>> {
        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .and_then(AuthChallenge::parse);
        match challenge {
            Some(challenge) => {
                challenge
                    .pull_token(&self.client, repository, &self.output)
                    .await
            }
            None => {
                self.output
                    .detail("No bearer challenge on 401, keeping the auth-required answer");
                Ok(None)
            }
        }
    }

    async fn send(&self, method: Method, url: &Url, token: Option<&str>) -> Result<Response> {
        let mut request = self
            .client
            .request(method, url.clone())
            .header("Accept", MANIFEST_ACCEPT);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "manifest check"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_status_mapping() {
        assert_eq!(
            ManifestStatus::from_status(StatusCode::OK),
            Some(ManifestStatus::Present)
        );
        assert_eq!(
            ManifestStatus::from_status(StatusCode::NOT_FOUND),
            Some(ManifestStatus::Missing)
        );
        assert_eq!(
            ManifestStatus::from_status(StatusCode::UNAUTHORIZED),
            Some(ManifestStatus::AuthRequired)
        );
        assert_eq!(ManifestStatus::from_status(StatusCode::TOO_MANY_REQUESTS), None);
        assert_eq!(ManifestStatus::from_status(StatusCode::FORBIDDEN), None);
    }

    #[test]
    fn test_auth_required_counts_as_existing() {
        assert!(ManifestStatus::AuthRequired.exists());
        assert!(ManifestStatus::Present.exists());
        assert!(!ManifestStatus::Missing.exists());
    }
}
