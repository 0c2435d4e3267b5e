//! Typed failures of the churn engine.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChurnError {
    #[error("Client asset directory not found: {}", .0.display())]
    NoClientDir(PathBuf),

    #[error("Failed to fetch remote manifest: {0}")]
    RemoteManifestFetchFailed(String),

    #[error("Failed to upload remote manifest: {0}")]
    RemoteManifestUploadFailed(String),

    #[error("Churn computation failed: {0}")]
    ComputeFailed(String),
}

impl ChurnError {
    /// Stable machine-readable code for this failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            ChurnError::NoClientDir(_) => "CHURN_NO_CLIENT_DIR",
            ChurnError::RemoteManifestFetchFailed(_) => "CHURN_REMOTE_MANIFEST_FETCH_FAILED",
            ChurnError::RemoteManifestUploadFailed(_) => "CHURN_REMOTE_MANIFEST_UPLOAD_FAILED",
            ChurnError::ComputeFailed(_) => "CHURN_COMPUTE_FAILED",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChurnError>;
