//! CI collaborator contract consumed by the pipeline driver

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Run status value GitHub reports once a run can no longer change
pub const TERMINAL_STATUS: &str = "completed";
pub const SUCCESS_CONCLUSION: &str = "success";

/// Status of the most recent workflow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub id: u64,
    pub status: String,
    pub conclusion: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        self.status == TERMINAL_STATUS
    }

    pub fn succeeded(&self) -> bool {
        self.is_terminal() && self.conclusion.as_deref() == Some(SUCCESS_CONCLUSION)
    }
}

/// How the definition store applied a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    /// Stored content already matched; nothing was committed
    Unchanged,
}

impl WriteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOutcome::Created => "created",
            WriteOutcome::Updated => "updated",
            WriteOutcome::Unchanged => "unchanged",
        }
    }
}

/// Workflow definition store, dispatcher and run-status source
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    /// Create or replace the transfer workflow definition
    async fn write_definition(&self, content: &str, message: &str) -> Result<WriteOutcome>;

    /// Dispatch a run of the transfer workflow
    async fn trigger_run(&self, event_type: &str) -> Result<()>;

    /// Status of the most recent dispatched run, if any
    async fn latest_run(&self) -> Result<Option<RunStatus>>;
}
