//! Utility modules for the deploy CLI.

pub mod errors;
pub mod logger;

pub use errors::{DeployError, Result};
