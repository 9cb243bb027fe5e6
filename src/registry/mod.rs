//! Registry module for source image lookups
//!
//! This module provides the existence prober used before a mirror run is
//! started: Docker Registry HTTP API v2 manifest checks (GHCR and third-party
//! registries, with anonymous pull tokens for Docker Hub's registry) and Docker
//! Hub tag lookups.

pub mod auth;
pub mod docker_hub;
pub mod manifest;
pub mod prober;

pub use auth::AuthChallenge;
pub use docker_hub::DockerHubClient;
pub use manifest::{ManifestChecker, ManifestStatus};
pub use prober::{ExistenceCheck, ExistenceProber, RegistryProber, RegistryProberBuilder};
