//! Baseline manifest storage on the remote host.
//!
//! The baseline lives in `{remote_dir}/.deploy/manifest`, next to (not inside)
//! the directory the sync step mirrors with deletion.

use super::transport::{shell_quote, RemoteShell, TransportError};
use crate::error::{ChurnError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fmt;
use tracing::{debug, info};

/// Directory under the remote app root holding deploy state.
pub const DEPLOY_STATE_DIR: &str = ".deploy";

/// File name of the baseline manifest inside [`DEPLOY_STATE_DIR`].
pub const BASELINE_FILE: &str = "manifest";

/// `test -f` exits with this status when the file does not exist.
const TEST_ABSENT_STATUS: i32 = 1;

/// Heredoc delimiter for uploads; cannot collide with base64 output.
const HEREDOC_MARKER: &str = "__DEPLOY_MANIFEST__";

/// Column width for the base64 body inside the heredoc.
const BASE64_LINE_WIDTH: usize = 76;

pub fn baseline_path(remote_dir: &str) -> String {
    format!(
        "{}/{}/{}",
        remote_dir.trim_end_matches('/'),
        DEPLOY_STATE_DIR,
        BASELINE_FILE
    )
}

/// Outcome of looking up the previous baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineFetch {
    /// No baseline yet (first deploy). Not an error.
    Missing,
    /// Raw baseline text, unparsed.
    Found(String),
    Failed(FetchFailure),
}

/// Why a baseline fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The remote shell itself broke.
    Transport(TransportError),
    /// The remote command ran but did not succeed.
    Remote {
        step: &'static str,
        exit_code: i32,
        stderr: String,
    },
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Transport(e) => write!(f, "transport error: {}", e),
            FetchFailure::Remote {
                step,
                exit_code,
                stderr,
            } => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    write!(f, "{} exited with status {}", step, exit_code)
                } else {
                    write!(f, "{} exited with status {}: {}", step, exit_code, stderr)
                }
            }
        }
    }
}

/// Fetch and persist the baseline manifest text.
#[async_trait]
pub trait BaselineStore: Send + Sync {
    async fn fetch_baseline(&self) -> BaselineFetch;

    async fn upload_baseline(&self, content: &str) -> Result<()>;
}

/// [`BaselineStore`] that composes shell commands over a [`RemoteShell`].
pub struct RemoteBaselineStore<S> {
    shell: S,
    path: String,
}

impl<S: RemoteShell> RemoteBaselineStore<S> {
    /// Store rooted at the remote app directory.
    pub fn new(shell: S, remote_dir: &str) -> Self {
        Self::with_path(shell, baseline_path(remote_dir))
    }

    pub fn with_path(shell: S, path: impl Into<String>) -> Self {
        Self {
            shell,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    fn parent_dir(&self) -> &str {
        match self.path.rsplit_once('/') {
            Some(("", _)) => "/",
            Some((parent, _)) => parent,
            None => ".",
        }
    }

    fn upload_command(&self, content: &str) -> String {
        let encoded = BASE64.encode(content.as_bytes());
        let tmp_path = format!("{}.tmp", self.path);

        let mut command = format!(
            "mkdir -p {parent} && base64 -d > {tmp} <<'{marker}' && mv -f {tmp} {path}\n",
            parent = shell_quote(self.parent_dir()),
            tmp = shell_quote(&tmp_path),
            path = shell_quote(&self.path),
            marker = HEREDOC_MARKER,
        );
        // base64 output is ASCII, so byte chunks are valid str boundaries
        for chunk in encoded.as_bytes().chunks(BASE64_LINE_WIDTH) {
            command.push_str(&String::from_utf8_lossy(chunk));
            command.push('\n');
        }
        command.push_str(HEREDOC_MARKER);
        command.push('\n');
        command
    }
}

#[async_trait]
impl<S: RemoteShell> BaselineStore for RemoteBaselineStore<S> {
    async fn fetch_baseline(&self) -> BaselineFetch {
        let quoted = shell_quote(&self.path);

        let check = match self.shell.exec(&format!("test -f {}", quoted)).await {
            Ok(output) => output,
            Err(e) => return BaselineFetch::Failed(FetchFailure::Transport(e)),
        };

        if !check.success() {
            if check.exit_code == TEST_ABSENT_STATUS && check.stderr.trim().is_empty() {
                info!(target_host = self.shell.target(), path = %self.path, "No remote baseline manifest yet");
                return BaselineFetch::Missing;
            }
            return BaselineFetch::Failed(FetchFailure::Remote {
                step: "existence check",
                exit_code: check.exit_code,
                stderr: check.stderr,
            });
        }

        match self.shell.exec(&format!("cat {}", quoted)).await {
            Ok(output) if output.success() => {
                debug!(path = %self.path, bytes = output.stdout.len(), "Fetched remote baseline manifest");
                BaselineFetch::Found(output.stdout)
            }
            Ok(output) => BaselineFetch::Failed(FetchFailure::Remote {
                step: "read",
                exit_code: output.exit_code,
                stderr: output.stderr,
            }),
            Err(e) => BaselineFetch::Failed(FetchFailure::Transport(e)),
        }
    }

    async fn upload_baseline(&self, content: &str) -> Result<()> {
        let command = self.upload_command(content);

        let output = self.shell.exec(&command).await.map_err(|e| {
            ChurnError::RemoteManifestUploadFailed(format!("transport error: {}", e))
        })?;

        if !output.success() {
            return Err(ChurnError::RemoteManifestUploadFailed(format!(
                "write to {} exited with status {}: {}",
                self.path,
                output.exit_code,
                output.stderr.trim()
            )));
        }

        info!(target_host = self.shell.target(), path = %self.path, bytes = content.len(), "Uploaded baseline manifest");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeShell;

    fn store(shell: FakeShell) -> RemoteBaselineStore<FakeShell> {
        RemoteBaselineStore::new(shell, "/srv/app")
    }

    /// Pull the base64 body back out of an upload command and decode it.
    fn decode_upload(command: &str) -> String {
        let body: String = command
            .lines()
            .skip(1)
            .take_while(|line| *line != HEREDOC_MARKER)
            .collect();
        String::from_utf8(BASE64.decode(body).unwrap()).unwrap()
    }

    #[test]
    fn test_baseline_path() {
        assert_eq!(baseline_path("/srv/app"), "/srv/app/.deploy/manifest");
        assert_eq!(baseline_path("/srv/app/"), "/srv/app/.deploy/manifest");
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let store = store(FakeShell::new().reply(1, "", ""));

        assert_eq!(store.fetch_baseline().await, BaselineFetch::Missing);
        assert_eq!(store.shell().commands(), vec!["test -f '/srv/app/.deploy/manifest'"]);
    }

    #[tokio::test]
    async fn test_fetch_found() {
        let store = store(FakeShell::new().reply(0, "", "").reply(0, "100  ./a.js\n", ""));

        assert_eq!(
            store.fetch_baseline().await,
            BaselineFetch::Found("100  ./a.js\n".into())
        );
        let commands = store.shell().commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1], "cat '/srv/app/.deploy/manifest'");
    }

    #[tokio::test]
    async fn test_fetch_check_status_1_with_stderr_is_error() {
        let store = store(FakeShell::new().reply(1, "", "bash: test: weird"));

        match store.fetch_baseline().await {
            BaselineFetch::Failed(FetchFailure::Remote { step, exit_code, .. }) => {
                assert_eq!(step, "existence check");
                assert_eq!(exit_code, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_check_other_status_is_error() {
        let store = store(FakeShell::new().reply(2, "", ""));

        assert!(matches!(
            store.fetch_baseline().await,
            BaselineFetch::Failed(FetchFailure::Remote { exit_code: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_transport_failure_during_check() {
        let store = store(FakeShell::new().fail(TransportError::Connection {
            target: "fake@host".into(),
            stderr: "Connection refused".into(),
        }));

        match store.fetch_baseline().await {
            BaselineFetch::Failed(failure @ FetchFailure::Transport(_)) => {
                assert!(failure.to_string().contains("Connection refused"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.shell().commands().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_read_failure() {
        let store = store(FakeShell::new().reply(0, "", "").reply(1, "", "cat: Permission denied"));

        match store.fetch_baseline().await {
            BaselineFetch::Failed(failure) => {
                assert_eq!(
                    failure.to_string(),
                    "read exited with status 1: cat: Permission denied"
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_encodes_content() {
        let store = store(FakeShell::new());
        let content = "100  ./a.js\n200  ./it's here.css\n".repeat(20);

        store.upload_baseline(&content).await.unwrap();

        let commands = store.shell().commands();
        assert_eq!(commands.len(), 1);
        let first_line = commands[0].lines().next().unwrap();
        assert!(first_line.starts_with("mkdir -p '/srv/app/.deploy' && base64 -d > '/srv/app/.deploy/manifest.tmp'"));
        assert!(first_line.ends_with("mv -f '/srv/app/.deploy/manifest.tmp' '/srv/app/.deploy/manifest'"));
        assert!(commands[0].ends_with("__DEPLOY_MANIFEST__\n"));
        assert!(commands[0].lines().all(|l| l.len() <= BASE64_LINE_WIDTH || l == first_line));
        assert_eq!(decode_upload(&commands[0]), content);
    }

    #[tokio::test]
    async fn test_upload_empty_content() {
        let store = store(FakeShell::new());

        store.upload_baseline("").await.unwrap();
        assert_eq!(decode_upload(&store.shell().commands()[0]), "");
    }

    #[tokio::test]
    async fn test_upload_nonzero_exit() {
        let store = store(FakeShell::new().reply(1, "", "mkdir: Permission denied"));

        let err = store.upload_baseline("1  ./a.js\n").await.unwrap_err();
        assert_eq!(err.code(), "CHURN_REMOTE_MANIFEST_UPLOAD_FAILED");
        assert!(err.to_string().contains("Permission denied"));
    }

    #[tokio::test]
    async fn test_upload_transport_failure() {
        let store = store(FakeShell::new().fail(TransportError::Spawn("No such file".into())));

        let err = store.upload_baseline("1  ./a.js\n").await.unwrap_err();
        assert_eq!(err.code(), "CHURN_REMOTE_MANIFEST_UPLOAD_FAILED");
    }

    #[test]
    fn test_parent_dir_edge_cases() {
        assert_eq!(RemoteBaselineStore::with_path(FakeShell::new(), "/manifest").parent_dir(), "/");
        assert_eq!(RemoteBaselineStore::with_path(FakeShell::new(), "manifest").parent_dir(), ".");
    }
}
