//! Scripted [`RemoteShell`] for tests.

use super::transport::{RemoteShell, ShellOutput, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replies to commands from a queue and records every command it receives.
/// An exhausted queue answers with exit code 0 and empty output.
#[derive(Default)]
pub(crate) struct FakeShell {
    replies: Mutex<VecDeque<Result<ShellOutput, TransportError>>>,
    commands: Mutex<Vec<String>>,
}

impl FakeShell {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(ShellOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }));
        self
    }

    pub(crate) fn fail(self, error: TransportError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn count_matching(&self, needle: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(needle)).count()
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn exec(&self, command: &str) -> Result<ShellOutput, TransportError> {
        self.commands.lock().unwrap().push(command.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ShellOutput {
                    exit_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            })
    }

    fn target(&self) -> &str {
        "fake@host"
    }
}
