//! Docker Hub tag lookups through the Hub web API

use crate::common::UrlUtils;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::Result;
use crate::logging::Logger;
use reqwest::Client;
use url::Url;

/// Namespace that holds Docker official images
pub const OFFICIAL_NAMESPACE: &str = "library";

#[derive(Clone)]
pub struct DockerHubClient {
    client: Client,
    api_base: Url,
    output: Logger,
}

impl DockerHubClient {
    pub fn new(client: Client, api_base: Url, output: Logger) -> Self {
        Self {
            client,
            api_base,
            output,
        }
    }

    /// Official images are published under the `library` namespace
    pub fn is_official(namespace: &str) -> bool {
        namespace == OFFICIAL_NAMESPACE
    }

    /// Check `GET /v2/namespaces/{namespace}/repositories/{name}/tags/{tag}`
    pub async fn tag_exists(&self, namespace: &str, name: &str, tag: &str) -> Result<bool> {
        let url = UrlUtils::endpoint(
            &self.api_base,
            &["v2", "namespaces", namespace, "repositories", name, "tags", tag],
        )?;
        self.output.verbose(&format!("Checking Docker Hub tag: {}", url));

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Docker Hub tag lookup"))?;

        match response.status().as_u16() {
            200 => {
                self.output
                    .detail(&format!("Tag {}/{}:{} exists on Docker Hub", namespace, name, tag));
                Ok(true)
            }
            404 => {
                self.output.detail(&format!(
                    "Tag {}/{}:{} does not exist on Docker Hub",
                    namespace, name, tag
                ));
                Ok(false)
            }
            _ => {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Failed to read error response".to_string());
                Err(HttpErrorHandler::handle_registry_error(
                    status,
                    &error_text,
                    "Docker Hub tag lookup",
                ))
            }
        }
    }
}
