//! Custom error types for the deploy pipeline.

use deploy_churn::ChurnError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tests failed: {0}")]
    Tests(String),

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Sync failed: {0}")]
    Sync(String),

    #[error("Restart failed: {0}")]
    Restart(String),

    #[error("Health check failed: {0}")]
    HealthCheck(String),

    #[error(transparent)]
    Churn(#[from] ChurnError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeployError {
    pub fn code(&self) -> &'static str {
        match self {
            DeployError::Config(_) => "CONFIG_INVALID",
            DeployError::Tests(_) => "TESTS_FAILED",
            DeployError::Build(_) => "BUILD_FAILED",
            DeployError::Sync(_) => "SYNC_FAILED",
            DeployError::Restart(_) => "RESTART_FAILED",
            DeployError::HealthCheck(_) => "HEALTH_CHECK_FAILED",
            DeployError::Churn(e) => e.code(),
            DeployError::Io(_) => "IO_FAILED",
            DeployError::Serialization(_) => "SERIALIZATION_FAILED",
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
