//! Transfer workflow generation
//!
//! Renders the GitHub Actions workflow that pulls the source image, logs in
//! to the SWR registry of the target region, re-tags and pushes. Rendering is
//! pure: identical requests produce byte-identical output, which lets the
//! definition store detect unchanged content.

use crate::reference::{swr_registry_host, Dialect, ImageReference};
use serde::{Deserialize, Serialize};

/// Path of the transfer workflow inside the transfer repository
pub const WORKFLOW_PATH: &str = ".github/workflows/docker-publish.yml";
/// `repository_dispatch` event type that starts the transfer workflow
pub const DISPATCH_EVENT: &str = "startTransfer";

/// Credentials for the target SWR registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

impl RegistryCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// SWR login names are region scoped: `account@domain` becomes `region@domain`
    pub fn login_username(&self, region: &str) -> String {
        match self.username.split_once('@') {
            Some((_, domain)) => format!("{}@{}", region, domain),
            None => self.username.clone(),
        }
    }
}

/// Everything the generator substitutes into the workflow
#[derive(Debug, Clone, Copy)]
pub struct WorkflowRequest<'a> {
    pub source: &'a ImageReference,
    pub target: &'a str,
    pub region: &'a str,
    pub dialect: Dialect,
    pub credentials: &'a RegistryCredentials,
}

impl WorkflowRequest<'_> {
    /// Commit message used when writing the workflow file
    pub fn commit_message(&self) -> String {
        self.source.pull_reference()
    }
}

/// Render the transfer workflow for a request
pub fn render(request: &WorkflowRequest<'_>) -> String {
    let source = request.source.pull_reference();
    let registry = swr_registry_host(request.region);
    let username = request.credentials.login_username(request.region);

    format!(
        r#"
name: Docker Image CI

on:
  repository_dispatch:
    types:
      - {event}
  workflow_dispatch:

jobs:
  docker:
    runs-on: ubuntu-latest
    steps:
      - name: Pull Docker image from {source_name}
        run: |
          docker pull {source}

      - name: Login to HuaWei Docker Hub
        uses: docker/login-action@v3
        with:
          registry: {registry}
          username: {username}
          password: {password}

      - name: Tag the image for HuaWei
        run: |
          docker tag {source} {target}

      - name: Push the image to HuaWei Docker Hub
        run: |
          docker push {target}
"#,
        event = DISPATCH_EVENT,
        source_name = request.dialect.display_name(),
        source = source,
        registry = registry,
        username = yaml_quote(&username),
        password = yaml_quote(&request.credentials.password),
        target = request.target,
    )
}

/// Single-quoted YAML scalar, so credentials cannot break the document
fn yaml_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
