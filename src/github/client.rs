//! GitHub REST client for the transfer repository
//!
//! Stores the transfer workflow through the contents API, dispatches runs
//! with `repository_dispatch` and reads run status from the Actions API.

use super::types::{
    ContentFile, CreateRepositoryRequest, DispatchRequest, GitHubUser, PutContentRequest,
    Repository, WorkflowRunsPage,
};
use crate::common::{DigestUtils, UrlUtils};
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use crate::pipeline::{RunStatus, WorkflowBackend, WriteOutcome};
use crate::workflow::WORKFLOW_PATH;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_TRANSFER_REPO: &str = "myDockerHub";
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const DISPATCH_RUN_EVENT: &str = "repository_dispatch";
const TRANSFER_REPO_DESCRIPTION: &str = "Transfer repository for mirroring container images";
const USER_AGENT: &str = concat!("image-mirror/", env!("CARGO_PKG_VERSION"));

pub struct GitHubClientBuilder {
    api_url: String,
    token: Option<String>,
    owner: Option<String>,
    repository: String,
    timeout: u64,
    output: Logger,
}

impl Default for GitHubClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubClientBuilder {
    pub fn new() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            owner: None,
            repository: DEFAULT_TRANSFER_REPO.to_string(),
            timeout: 30,
            output: Logger::default(),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Skip the `GET /user` lookup and use this repository owner
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
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

    pub fn build(self) -> Result<GitHubClient> {
        let token = self
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                MirrorError::Config(
                    "GitHub token is not set, export GITHUB_TOKEN to use the transfer repository"
                        .to_string(),
                )
            })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(self.timeout))
            .build()
            .map_err(|e| MirrorError::Network(format!("Failed to create GitHub client: {}", e)))?;

        Ok(GitHubClient {
            client,
            api_url: UrlUtils::parse_base(&self.api_url)?,
            token,
            owner: OnceCell::new_with(self.owner),
            repository: self.repository,
            output: self.output,
        })
    }
}

/// GitHub backend for the transfer repository of the token's user
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    token: String,
    owner: OnceCell<String>,
    repository: String,
    output: Logger,
}

impl GitHubClient {
    pub fn builder() -> GitHubClientBuilder {
        GitHubClientBuilder::new()
    }

    pub fn repository_name(&self) -> &str {
        &self.repository
    }

    /// Login of the token's user, fetched once
    pub async fn username(&self) -> Result<&str> {
        let login = self
            .owner
            .get_or_try_init(|| async {
                let url = UrlUtils::endpoint(&self.api_url, &["user"])?;
                let response = self.send(self.client.get(url), "user lookup").await?;
                let user: GitHubUser =
                    Self::parse_json(Self::ensure_success(response, "user lookup").await?).await?;
                self.output.verbose(&format!("Authenticated as {}", user.login));
                Ok::<_, MirrorError>(user.login)
            })
            .await?;
        Ok(login.as_str())
    }

    /// Make sure the transfer repository exists, creating it private and
    /// initialized when it does not
    pub async fn ensure_transfer_repository(&self) -> Result<Repository> {
        let owner = self.username().await?;
        let url = UrlUtils::endpoint(&self.api_url, &["repos", owner, &self.repository])?;
        let response = self.send(self.client.get(url), "repository lookup").await?;

        if response.status() != StatusCode::NOT_FOUND {
            let repository: Repository =
                Self::parse_json(Self::ensure_success(response, "repository lookup").await?)
                    .await?;
            self.output
                .info(&format!("Transfer repository {} exists", repository.full_name));
            return Ok(repository);
        }

        self.output.step(&format!(
            "Creating private transfer repository {}/{}",
            owner, self.repository
        ));
        let url = UrlUtils::endpoint(&self.api_url, &["user", "repos"])?;
        let body = CreateRepositoryRequest {
            name: &self.repository,
            private: true,
            auto_init: true,
            description: TRANSFER_REPO_DESCRIPTION,
        };
        let response = self
            .send(self.client.post(url).json(&body), "repository creation")
            .await?;
        let repository: Repository =
            Self::parse_json(Self::ensure_success(response, "repository creation").await?).await?;
        self.output
            .success(&format!("Created transfer repository {}", repository.full_name));
        Ok(repository)
    }

    /// One page of dispatched transfer runs, newest first
    pub async fn list_runs(&self, page: u32, per_page: u32) -> Result<WorkflowRunsPage> {
        let owner = self.username().await?;
        let mut url = UrlUtils::endpoint(
            &self.api_url,
            &["repos", owner, &self.repository, "actions", "runs"],
        )?;
        url.query_pairs_mut()
            .append_pair("event", DISPATCH_RUN_EVENT)
            .append_pair("exclude_pull_requests", "false")
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());

        let response = self.send(self.client.get(url), "workflow run listing").await?;
        Self::parse_json(Self::ensure_success(response, "workflow run listing").await?).await
    }

    async fn workflow_file(&self) -> Result<Option<ContentFile>> {
        let owner = self.username().await?;
        let url = UrlUtils::endpoint(
            &self.api_url,
            &["repos", owner, &self.repository, "contents", WORKFLOW_PATH],
        )?;
        let response = self.send(self.client.get(url), "workflow lookup").await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let file = Self::parse_json(Self::ensure_success(response, "workflow lookup").await?).await?;
        Ok(Some(file))
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        request
            .bearer_auth(&self.token)
            .header("Accept", GITHUB_ACCEPT)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, operation))
    }

    async fn ensure_success(response: Response, operation: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        Err(HttpErrorHandler::handle_github_error(
            status,
            &error_text,
            operation,
        ))
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Decode a contents API payload; GitHub wraps base64 at 60 columns
pub fn decode_content(file: &ContentFile) -> Result<String> {
    if let Some(encoding) = file.encoding.as_deref() {
        if encoding != "base64" {
            return Err(MirrorError::Parse(format!(
                "unsupported content encoding '{}'",
                encoding
            )));
        }
    }
    let compact: String = file
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(compact)?;
    Ok(String::from_utf8(bytes)?)
}

#[async_trait]
impl WorkflowBackend for GitHubClient {
    async fn write_definition(&self, content: &str, message: &str) -> Result<WriteOutcome> {
        let existing = self.workflow_file().await?;

        if let Some(file) = &existing {
            match decode_content(file) {
                Ok(current)
                    if DigestUtils::compute_sha256_str(&current)
                        == DigestUtils::compute_sha256_str(content) =>
                {
                    self.output
                        .verbose("Workflow definition already up to date, skipping commit");
                    return Ok(WriteOutcome::Unchanged);
                }
                Ok(_) => {}
                Err(e) => self
                    .output
                    .warning(&format!("Could not read stored workflow: {}", e)),
            }
        }

        let owner = self.username().await?;
        let url = UrlUtils::endpoint(
            &self.api_url,
            &["repos", owner, &self.repository, "contents", WORKFLOW_PATH],
        )?;
        let body = PutContentRequest {
            message,
            content: STANDARD.encode(content),
            sha: existing.as_ref().map(|file| file.sha.as_str()),
        };
        self.output
            .verbose(&format!("Writing {} to {}/{}", WORKFLOW_PATH, owner, self.repository));
        let response = self
            .send(self.client.put(url).json(&body), "workflow update")
            .await?;
        Self::ensure_success(response, "workflow update").await?;

        Ok(if existing.is_some() {
            WriteOutcome::Updated
        } else {
            WriteOutcome::Created
        })
    }

    async fn trigger_run(&self, event_type: &str) -> Result<()> {
        let owner = self.username().await?;
        let url = UrlUtils::endpoint(&self.api_url, &["repos", owner, &self.repository, "dispatches"])?;
        let response = self
            .send(
                self.client.post(url).json(&DispatchRequest { event_type }),
                "workflow dispatch",
            )
            .await?;
        Self::ensure_success(response, "workflow dispatch").await?;
        self.output
            .verbose(&format!("Dispatched '{}' to {}/{}", event_type, owner, self.repository));
        Ok(())
    }

    async fn latest_run(&self) -> Result<Option<RunStatus>> {
        let page = self.list_runs(1, 1).await?;
        Ok(page.workflow_runs.into_iter().next().map(RunStatus::from))
    }
}
