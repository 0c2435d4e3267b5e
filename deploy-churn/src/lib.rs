//! Deploy Churn Library
//!
//! Measures how much of a freshly built client bundle returning users must
//! download, by diffing the local asset tree against the baseline manifest
//! left on the remote host by the previous deploy.

pub mod churn;
pub mod compare;
pub mod error;
pub mod local;
pub mod manifest;
pub mod remote;
pub mod report;

// Re-export commonly used types
pub use churn::{compute_client_churn, compute_client_churn_over_ssh};
pub use compare::{compare, ChurnMetrics};
pub use error::{ChurnError, Result};
pub use manifest::Manifest;
pub use remote::{BaselineFetch, BaselineStore, RemoteBaselineStore, RemoteShell, RemoteTarget, SshShell};
pub use report::format_churn_summary;
