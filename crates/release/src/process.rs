//! Subprocess execution with captured output and timeouts.
//!
//! Shared by the git, forge and package manager implementations.

use crate::backends::CommandOutput;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// A command to run.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl Cmd {
    /// Start building a command for `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Kill the process after `timeout`.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The command line, for logs.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run and capture output. A non-zero exit is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] if the program cannot be started and
    /// [`Error::Timeout`] if it outlives its timeout.
    pub async fn run(&self) -> Result<CommandOutput> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        debug!(command = %self.display(), cwd = ?self.cwd, "Running command");
        let output = command.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output).await.map_err(|_| Error::Timeout {
                operation: self.display(),
                seconds: limit.as_secs(),
            })?,
            None => output.await,
        }
        .map_err(|e| Error::command(&self.program, e.to_string()))?;

        let result = CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            artifacts: Vec::new(),
        };
        debug!(command = %self.display(), exit_code = ?result.exit_code, "Command finished");
        Ok(result)
    }

    /// Run and return trimmed stdout, failing on a non-zero exit.
    ///
    /// # Errors
    ///
    /// As [`Self::run`], plus [`Error::Command`] carrying stderr on a
    /// non-zero exit.
    pub async fn run_checked(&self) -> Result<String> {
        let output = self.run().await?;
        if output.success {
            Ok(output.stdout.trim().to_string())
        } else {
            Err(Error::command(self.display(), output.summary()))
        }
    }
}
