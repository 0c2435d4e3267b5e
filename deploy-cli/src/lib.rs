//! Deploy CLI Library
//!
//! Runs tests, builds the app, mirrors the build to the remote host, restarts
//! it under pm2 and reports client bundle churn against the previous deploy.

pub mod config;
pub mod pipeline;
pub mod runner;
pub mod steps;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use pipeline::{DeployOptions, DeployReport, Pipeline};
pub use utils::errors::DeployError;
pub type Result<T> = std::result::Result<T, DeployError>;
