//! GitHub Actions backend for the mirror pipeline

pub mod client;
pub mod types;

pub use client::{GitHubClient, GitHubClientBuilder, DEFAULT_API_URL, DEFAULT_TRANSFER_REPO};
pub use types::{Repository, WorkflowRun, WorkflowRunsPage};
