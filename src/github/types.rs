//! GitHub REST API payloads

use crate::pipeline::RunStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateRepositoryRequest<'a> {
    pub name: &'a str,
    pub private: bool,
    pub auto_init: bool,
    pub description: &'a str,
}

/// `GET /repos/{owner}/{repo}/contents/{path}` for a file
#[derive(Debug, Deserialize)]
pub struct ContentFile {
    pub sha: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PutContentRequest<'a> {
    pub message: &'a str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct DispatchRequest<'a> {
    pub event_type: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
    pub status: String,
    pub conclusion: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl From<WorkflowRun> for RunStatus {
    fn from(run: WorkflowRun) -> Self {
        RunStatus {
            id: run.id,
            status: run.status,
            conclusion: run.conclusion,
            html_url: run.html_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRunsPage {
    pub total_count: u64,
    pub workflow_runs: Vec<WorkflowRun>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_page_deserialize() {
        let body = r#"{
            "total_count": 2,
            "workflow_runs": [
                {"id": 42, "name": "Docker Image CI", "display_title": "nginx:alpine",
                 "status": "in_progress", "conclusion": null,
                 "html_url": "https://github.com/me/myDockerHub/actions/runs/42",
                 "created_at": "2026-01-01T00:00:00Z", "run_attempt": 1}
            ]
        }"#;
        let page: WorkflowRunsPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.total_count, 2);
        let status = RunStatus::from(page.workflow_runs[0].clone());
        assert_eq!(status.id, 42);
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_put_request_omits_missing_sha() {
        let request = PutContentRequest {
            message: "nginx:alpine",
            content: "Cg==".to_string(),
            sha: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("sha").is_none());
    }
}
