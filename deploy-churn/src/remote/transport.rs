//! Remote command execution over ssh.
//!
//! Commands are run by spawning the system `ssh` client with a fixed set of
//! hardened options. A remote command that runs and exits non-zero is a normal
//! [`ShellOutput`]; only failures of the channel itself are [`TransportError`].

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Options applied to every ssh invocation (also used for rsync's `-e`).
pub const SSH_HARDENED_OPTIONS: &[&str] = &[
    "-o",
    "BatchMode=yes",
    "-o",
    "ConnectTimeout=10",
    "-o",
    "ServerAliveInterval=15",
    "-o",
    "ServerAliveCountMax=3",
    "-o",
    "AddressFamily=inet",
    // keeps "Permanently added ..." notices out of stderr
    "-o",
    "LogLevel=ERROR",
];

/// ssh exits with 255 when it fails itself (connect, auth, host key).
const SSH_CONNECTION_FAILURE_STATUS: i32 = 255;

/// Result of a remote command that actually ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to spawn ssh: {0}")]
    Spawn(String),

    #[error("ssh connection to {target} failed: {stderr}")]
    Connection { target: String, stderr: String },

    #[error("ssh to {0} terminated by signal")]
    Terminated(String),
}

/// A channel that runs a shell command on a remote host.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run `command` remotely. Resolves once, after the command finished or
    /// the channel failed.
    async fn exec(&self, command: &str) -> Result<ShellOutput, TransportError>;

    /// Connection string used for logging and error messages.
    fn target(&self) -> &str;
}

#[async_trait]
impl<T: RemoteShell + ?Sized> RemoteShell for &T {
    async fn exec(&self, command: &str) -> Result<ShellOutput, TransportError> {
        (**self).exec(command).await
    }

    fn target(&self) -> &str {
        (**self).target()
    }
}

/// Where to connect: `user@host` plus optional port and key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub destination: String,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
}

impl RemoteTarget {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            port: None,
            identity_file: None,
        }
    }

    /// ssh arguments up to (not including) the destination.
    pub fn ssh_args(&self) -> Vec<String> {
        let mut args: Vec<String> = SSH_HARDENED_OPTIONS.iter().map(|s| s.to_string()).collect();
        if let Some(port) = self.port {
            args.push("-p".into());
            args.push(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            args.push("-i".into());
            args.push(identity.display().to_string());
        }
        args
    }

    /// The ssh command line as one string, for tools taking `-e` (rsync).
    pub fn ssh_command_line(&self) -> String {
        let mut line = String::from("ssh");
        for arg in self.ssh_args() {
            line.push(' ');
            line.push_str(&shell_quote(&arg));
        }
        line
    }
}

/// [`RemoteShell`] backed by the system ssh client.
#[derive(Debug, Clone)]
pub struct SshShell {
    target: RemoteTarget,
}

impl SshShell {
    pub fn new(target: RemoteTarget) -> Self {
        Self { target }
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn exec(&self, command: &str) -> Result<ShellOutput, TransportError> {
        tracing::debug!(target_host = %self.target.destination, command, "ssh exec");

        let output = Command::new("ssh")
            .args(self.target.ssh_args())
            .arg(&self.target.destination)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        match output.status.code() {
            Some(SSH_CONNECTION_FAILURE_STATUS) => Err(TransportError::Connection {
                target: self.target.destination.clone(),
                stderr: stderr.trim().to_string(),
            }),
            Some(exit_code) => Ok(ShellOutput {
                exit_code,
                stdout,
                stderr,
            }),
            None => Err(TransportError::Terminated(self.target.destination.clone())),
        }
    }

    fn target(&self) -> &str {
        &self.target.destination
    }
}

/// Quote a value for a POSIX shell.
///
/// The value is wrapped in single quotes; each embedded `'` becomes `'"'"'`.
pub fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' {
            quoted.push_str("'\"'\"'");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}
