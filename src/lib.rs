//! Image Mirror Library
//!
//! Mirrors Docker Hub and GHCR images into Huawei Cloud SWR by generating a
//! GitHub Actions transfer workflow, dispatching it and tracking the run.

pub mod cli;
pub mod common;
pub mod config;
pub mod error;
pub mod github;
pub mod logging;
pub mod pipeline;
pub mod reference;
pub mod registry;
pub mod workflow;

pub use config::AppConfig;
pub use error::{MirrorError, Result};
pub use logging::Logger;
pub use pipeline::{Phase, PipelineDriver};
pub use reference::{Dialect, ImageReference};
