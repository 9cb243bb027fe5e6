//! Error types and handlers for mirror operations

pub mod handlers;

use crate::reference::ReferenceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Clone, Error)]
pub enum MirrorError {
    /// Local, field-scoped input errors. Never reach the pipeline.
    #[error("Validation error: {0}")]
    Validation(#[from] ReferenceError),
    /// Source image missing (or unverifiable) in its registry
    #[error("{0}")]
    NotFound(String),
    /// Network related errors
    #[error("Network error: {0}")]
    Network(String),
    /// Registry related errors
    #[error("Registry error: {0}")]
    Registry(String),
    /// GitHub API errors
    #[error("GitHub error: {0}")]
    GitHub(String),
    /// Remote workflow run finished with a non-success conclusion
    #[error("workflow run failed: {conclusion}, see the build logs for details")]
    RunFailed { conclusion: String },
    /// A pipeline stage failed; the message names the stage
    #[error("{0}")]
    Pipeline(String),
    /// A run is already in flight for this driver
    #[error("Busy: {0}")]
    Busy(String),
    /// The pipeline surface was closed; the driver accepts no more runs
    #[error("pipeline closed")]
    Closed,
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),
    /// File IO errors
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MirrorError {
    fn from(err: std::io::Error) -> Self {
        MirrorError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(err: serde_json::Error) -> Self {
        MirrorError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for MirrorError {
    fn from(err: reqwest::Error) -> Self {
        MirrorError::Network(err.to_string())
    }
}

impl From<url::ParseError> for MirrorError {
    fn from(err: url::ParseError) -> Self {
        MirrorError::Config(err.to_string())
    }
}

impl From<base64::DecodeError> for MirrorError {
    fn from(err: base64::DecodeError) -> Self {
        MirrorError::Parse(format!("base64 decode error: {}", err))
    }
}

impl From<std::string::FromUtf8Error> for MirrorError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        MirrorError::Parse(format!("UTF-8 conversion error: {}", err))
    }
}
