//! Remote side of the churn engine: command transport and baseline storage.

pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod fake;

pub use store::{baseline_path, BaselineFetch, BaselineStore, FetchFailure, RemoteBaselineStore};
pub use transport::{shell_quote, RemoteShell, RemoteTarget, ShellOutput, SshShell, TransportError};
