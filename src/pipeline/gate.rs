//! Confirmation gate for untrusted sources

/// Shown when a Docker Hub source is not an official image
pub const UNTRUSTED_SOURCE_MESSAGE: &str =
    "You are pulling an image that is not an official Docker image; continuing may be risky.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Cancel,
}

/// One-shot user decision tied to a single pipeline run
#[derive(Debug, Clone)]
pub struct ConfirmationGate {
    message: String,
    decision: Option<Decision>,
}

impl ConfirmationGate {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            decision: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_resolved(&self) -> bool {
        self.decision.is_some()
    }

    pub fn decision(&self) -> Option<Decision> {
        self.decision
    }

    /// Record the decision. Returns `None` if the gate was already resolved.
    pub fn resolve(&mut self, decision: Decision) -> Option<Decision> {
        if self.decision.is_some() {
            return None;
        }
        self.decision = Some(decision);
        Some(decision)
    }
}
