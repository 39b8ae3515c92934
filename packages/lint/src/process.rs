//! Spawning of external tools with captured output and an optional timeout.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to wait for '{}': {source}", program.display())]
    Wait {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{}' did not finish within {}s", program.display(), after.as_secs())]
    TimedOut { program: PathBuf, after: Duration },
}

/// A fully described child process.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    pub env: Vec<(&'static str, OsString)>,
    pub timeout: Option<Duration>,
}

impl ToolCommand {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            cwd: cwd.into(),
            env: vec![],
            timeout: None,
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn envs(mut self, env: Vec<(&'static str, OsString)>) -> Self {
        self.env.extend(env);
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|x| x.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `command` to completion with stdin closed and both output streams
/// captured. The child is killed if the timeout elapses.
///
/// # Errors
///
/// * [`ProcessError::Spawn`] if the program cannot be started
/// * [`ProcessError::Wait`] if waiting for the program fails
/// * [`ProcessError::TimedOut`] if the program outlives the timeout
pub async fn run(command: &ToolCommand) -> Result<ProcessOutput, ProcessError> {
    log::debug!("Running `{}` in '{}'", command.display(), command.cwd.display());

    let child = Command::new(&command.program)
        .args(&command.args)
        .current_dir(&command.cwd)
        .envs(command.env.iter().map(|(key, value)| (*key, value)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: command.program.clone(),
            source,
        })?;

    let output = match command.timeout {
        Some(after) => tokio::time::timeout(after, child.wait_with_output())
            .await
            .map_err(|_| ProcessError::TimedOut {
                program: command.program.clone(),
                after,
            })?,
        None => child.wait_with_output().await,
    }
    .map_err(|source| ProcessError::Wait {
        program: command.program.clone(),
        source,
    })?;

    let output = ProcessOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    polylint_logging::debug_or_trace!(
        (
            "`{}` exited {:?}",
            display_program(&command.program),
            output.code
        ),
        (
            "`{}` exited {:?}\nstdout:\n{}\nstderr:\n{}",
            display_program(&command.program),
            output.code,
            output.stdout,
            output.stderr
        )
    );

    Ok(output)
}

fn display_program(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}
