//! Common module - shared utilities
//!
//! Helpers reused by the registry prober, the GitHub backend and the CLI.

pub mod utils;

pub use utils::*;
