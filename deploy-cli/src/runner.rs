//! Local process execution for pipeline steps.
//!
//! Output is streamed line by line into the log under the step name, so long
//! builds show progress instead of a wall of text at the end.

use crate::utils::{DeployError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::info;

/// A program invocation belonging to a named step.
#[derive(Debug, Clone)]
pub struct StepCommand {
    pub step: &'static str,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// What a finished process left behind.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Only filled when capture was requested
    pub stdout: String,
}

impl StepOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl StepCommand {
    pub fn new(step: &'static str, program: impl Into<String>) -> Self {
        Self {
            step,
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Build from an argv list such as `["npm", "run", "build"]`.
    pub fn from_argv(step: &'static str, argv: &[String]) -> Result<Self> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            DeployError::Config(format!("empty command for step '{}'", step))
        })?;
        Ok(Self::new(step, program.clone()).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Run to completion, streaming both output streams into the log.
    pub async fn run(&self, capture_stdout: bool) -> std::io::Result<StepOutput> {
        info!(step = self.step, program = %self.program, args = ?self.args, "Running");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (captured, _) = tokio::join!(
            pump(self.step, "stdout", stdout, capture_stdout),
            pump(self.step, "stderr", stderr, false),
        );
        let status = child.wait().await?;

        Ok(StepOutput {
            exit_code: status.code(),
            stdout: captured?,
        })
    }

    /// Run and turn spawn failures and non-zero exits into `on_failure(msg)`.
    pub async fn run_checked<F>(&self, capture_stdout: bool, on_failure: F) -> Result<StepOutput>
    where
        F: Fn(String) -> DeployError,
    {
        let output = self
            .run(capture_stdout)
            .await
            .map_err(|e| on_failure(format!("could not start {}: {}", self.program, e)))?;

        if output.success() {
            return Ok(output);
        }

        Err(on_failure(match output.exit_code {
            Some(code) => format!("{} exited with status {}", self.program, code),
            None => format!("{} was terminated by a signal", self.program),
        }))
    }
}

async fn pump<R>(
    step: &'static str,
    stream: &'static str,
    reader: Option<R>,
    capture: bool,
) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut captured = String::new();
    let Some(reader) = reader else {
        return Ok(captured);
    };

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if capture {
            captured.push_str(&line);
            captured.push('\n');
        } else {
            info!(step, stream, "{}", line);
        }
    }

    Ok(captured)
}
