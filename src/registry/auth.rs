//! Anonymous pull tokens for registries that challenge every request
//!
//! `registry-1.docker.io` answers any unauthenticated manifest request with
//! 401 and a `WWW-Authenticate: Bearer ...` challenge. Exchanging that
//! challenge for an anonymous pull token lets a manifest check tell a
//! missing image apart from one that merely needs a token.

use crate::error::handlers::NetworkErrorHandler;
use crate::error::Result;
use crate::logging::Logger;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

impl AuthChallenge {
    /// Parse `Bearer realm="...",service="...",scope="..."`.
    /// The challenge scope is ignored, the caller asks for its own.
    pub fn parse(header: &str) -> Option<Self> {
        let params = header.strip_prefix("Bearer ")?;
        let mut realm = None;
        let mut service = None;

        for param in params.split(',') {
            let Some((key, value)) = param.trim().split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').to_string();
            match key.trim() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                _ => {}
            }
        }

        Some(Self {
            realm: realm.filter(|realm| !realm.is_empty())?,
            service,
        })
    }

    /// Token endpoint asking for pull access to `repository`
    pub fn token_url(&self, repository: &str) -> Result<Url> {
        let mut url = Url::parse(&self.realm)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = &self.service {
                query.append_pair("service", service);
            }
            query.append_pair("scope", &format!("repository:{}:pull", repository));
        }
        Ok(url)
    }

    /// Fetch an anonymous pull token. `None` when the token service refuses.
    pub async fn pull_token(
        &self,
        client: &Client,
        repository: &str,
        output: &Logger,
    ) -> Result<Option<String>> {
        let url = self.token_url(repository)?;
        output.detail(&format!("Requesting anonymous pull token from {}", url));

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "token request"))?;
        if !response.status().is_success() {
            output.detail(&format!(
                "Token service refused anonymous pull for {}: {}",
                repository,
                response.status()
            ));
            return Ok(None);
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "token request"))?;
        Ok(body.token.or(body.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_docker_hub_challenge() {
        let challenge = AuthChallenge::parse(
            r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/alpine:pull""#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "https://auth.docker.io/token");
        assert_eq!(challenge.service.as_deref(), Some("registry.docker.io"));

        let url = challenge.token_url("library/alpine").unwrap();
        assert_eq!(
            url.as_str(),
            "https://auth.docker.io/token?service=registry.docker.io&scope=repository%3Alibrary%2Falpine%3Apull"
        );
    }

    #[test]
    fn test_rejects_non_bearer_challenge() {
        assert_eq!(AuthChallenge::parse(r#"Basic realm="registry""#), None);
        assert_eq!(AuthChallenge::parse(r#"Bearer service="registry.docker.io""#), None);
    }

    #[test]
    fn test_token_response_accepts_either_field() {
        let body: TokenResponse = serde_json::from_str(r#"{"access_token":"abc","expires_in":300}"#).unwrap();
        assert_eq!(body.token.or(body.access_token).as_deref(), Some("abc"));
    }
}
