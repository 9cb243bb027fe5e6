//! Mirror pipeline: phases, run state and the driver
//!
//! A submission moves through `initial -> examining -> (confirming) ->
//! updating -> triggering -> checking -> completed | error`. Every failure
//! resets to `initial`, keeping the error message for display.

pub mod backend;
pub mod driver;
pub mod gate;
pub mod poll;

pub use backend::{RunStatus, WorkflowBackend, WriteOutcome};
pub use driver::{CloseHandle, DriverSettings, PipelineDriver, DEFAULT_POLL_INTERVAL};
pub use gate::{ConfirmationGate, Decision, UNTRUSTED_SOURCE_MESSAGE};
pub use poll::PollHandle;

use crate::error::Result;
use crate::reference::{
    target_reference, validate_repository_name, validate_tag, Dialect, ImageReference,
};
use crate::workflow::{RegistryCredentials, WorkflowRequest};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Initial,
    Examining,
    Confirming,
    Updating,
    Triggering,
    Checking,
    Completed,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initial => "initial",
            Phase::Examining => "examining",
            Phase::Confirming => "confirming",
            Phase::Updating => "updating",
            Phase::Triggering => "triggering",
            Phase::Checking => "checking",
            Phase::Completed => "completed",
            Phase::Error => "error",
        }
    }

    /// Status line shown to the user while in this phase
    pub fn status_text(&self) -> &'static str {
        match self {
            Phase::Initial => "Ready to mirror",
            Phase::Examining => "Checking that the source image exists",
            Phase::Confirming => "Waiting for confirmation",
            Phase::Updating => "Updating the transfer workflow",
            Phase::Triggering => "Starting the transfer workflow",
            Phase::Checking => "Waiting for the transfer workflow to finish",
            Phase::Completed => "Image mirrored successfully",
            Phase::Error => "Mirroring failed",
        }
    }

    /// True while a submission is in flight
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Initial | Phase::Completed | Phase::Error)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination of a mirror inside the SWR registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorTarget {
    pub namespace: String,
    pub repository: String,
    pub tag: String,
}

impl MirrorTarget {
    pub fn new(
        namespace: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_repository_name(&self.namespace)?;
        validate_repository_name(&self.repository)?;
        validate_tag(&self.tag)?;
        Ok(())
    }

    pub fn reference(&self, region: &str) -> String {
        target_reference(region, &self.namespace, &self.repository, &self.tag)
    }
}

/// State of one submission, alive from submit until a terminal phase
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub source: ImageReference,
    pub target: String,
    pub region: String,
    pub dialect: Dialect,
    pub last_error: Option<String>,
}

impl PipelineRun {
    pub fn workflow_request<'a>(
        &'a self,
        credentials: &'a RegistryCredentials,
    ) -> WorkflowRequest<'a> {
        WorkflowRequest {
            source: &self.source,
            target: &self.target,
            region: &self.region,
            dialect: self.dialect,
            credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;

    #[test]
    fn test_active_phases() {
        assert!(!Phase::Initial.is_active());
        assert!(Phase::Confirming.is_active());
        assert!(Phase::Checking.is_active());
        assert!(!Phase::Completed.is_active());
        assert!(!Phase::Error.is_active());
    }

    #[test]
    fn test_target_validation() {
        assert!(MirrorTarget::new("team", "nginx", "alpine").validate().is_ok());
        assert!(matches!(
            MirrorTarget::new("team", "nginx", "").validate(),
            Err(MirrorError::Validation(_))
        ));
        assert!(MirrorTarget::new("Team", "nginx", "1").validate().is_err());
        assert!(MirrorTarget::new("a/b", "nginx", "1").validate().is_err());
        assert!(MirrorTarget::new("team", "bitnami/redis", "1").validate().is_err());
        assert_eq!(
            MirrorTarget::new("team", "nginx", "1.25").reference("cn-north-4"),
            "swr.cn-north-4.myhuaweicloud.com/team/nginx:1.25"
        );
    }
}
