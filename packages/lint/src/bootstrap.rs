//! Verification that every enabled tool is installed and usable.
//!
//! Each tool is located on the search path and probed with a cheap command.
//! Tools that download parts of themselves on first use are probed again with
//! exponential backoff before they are declared unusable.

use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};

use polylint_models::{BootstrapOutcome, BootstrapReport, BootstrapResult, BrokenReason};
use regex::Regex;
use tokio::task::JoinError;

use crate::{
    config::{LintConfig, ResolvedLinter},
    environ,
    process::{self, ProcessError, ProcessOutput, ToolCommand},
};

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)+").expect("Invalid Regex"));

/// Retry schedule for tools with a network bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `backoff * 2^attempt`,
    /// capped at `max_backoff`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_backoff)
    }
}

/// Where and how tools are looked up and probed.
#[derive(Debug, Clone)]
pub struct BootstrapContext {
    pub cwd: PathBuf,
    /// Replaces `PATH` for executable lookup when set
    pub search_path: Option<OsString>,
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
}

impl BootstrapContext {
    #[must_use]
    pub fn new(config: &LintConfig, cwd: &Path, search_path: Option<&OsStr>) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            search_path: search_path.map(OsStr::to_os_string),
            retry: config.retry,
            timeout: config.timeout,
        }
    }
}

/// Probes every enabled linter concurrently.
///
/// Results are returned in canonical order regardless of completion order.
///
/// # Errors
///
/// * If a probe task panics
pub async fn bootstrap(
    config: &LintConfig,
    context: &BootstrapContext,
) -> Result<BootstrapReport, JoinError> {
    let handles = config
        .enabled_linters()
        .cloned()
        .map(|linter| {
            let context = context.clone();
            tokio::spawn(async move { probe_linter(&linter, &context).await })
        })
        .collect::<Vec<_>>();

    let mut results = Vec::with_capacity(handles.len());

    for handle in handles {
        results.push(handle.await?);
    }

    Ok(BootstrapReport { results })
}

/// Locates `executable` in the search path, or relative to `cwd` when it
/// contains a path separator.
#[must_use]
pub fn resolve_executable(
    executable: &str,
    search_path: Option<&OsStr>,
    cwd: &Path,
) -> Option<PathBuf> {
    let paths = search_path
        .map(OsStr::to_os_string)
        .or_else(|| std::env::var_os("PATH"));

    match which::which_in(executable, paths, cwd) {
        Ok(path) => Some(path),
        Err(e) => {
            log::debug!("Could not locate '{executable}': {e}");
            None
        }
    }
}

async fn probe_linter(linter: &ResolvedLinter, context: &BootstrapContext) -> BootstrapResult {
    let name = linter.name();
    let spec = linter.spec;

    let Some(path) = resolve_executable(
        &linter.executable,
        context.search_path.as_deref(),
        &context.cwd,
    ) else {
        return BootstrapResult {
            linter: name,
            outcome: BootstrapOutcome::Missing,
            stdout: String::new(),
            stderr: String::new(),
        };
    };

    let command = ToolCommand::new(&path, &context.cwd)
        .args(spec.probe_args.iter().copied())
        .envs(environ::tool_env(name))
        .timeout(context.timeout);

    let mut attempt = 0;
    let (result, output) = loop {
        let (result, output) = probe(&command).await;

        match result {
            Err(reason) if spec.network_bootstrap && attempt < context.retry.retries => {
                let delay = context.retry.delay(attempt);
                log::debug!("{name} probe failed ({reason}), trying again in {delay:?}");
                log::trace!("{name} stdout:\n{}\n{name} stderr:\n{}", output.stdout, output.stderr);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => break (result, output),
        }
    };

    let outcome = match result {
        Ok(()) => check_version(&path, &output, spec.minimum_version),
        Err(reason) if spec.network_bootstrap => BootstrapOutcome::TransientFailure {
            attempts: attempt + 1,
            reason,
        },
        Err(reason) => BootstrapOutcome::Broken { reason },
    };

    log::debug!("Bootstrapped {name}: {outcome:?}");

    BootstrapResult {
        linter: name,
        outcome,
        stdout: output.stdout,
        stderr: output.stderr,
    }
}

async fn probe(command: &ToolCommand) -> (Result<(), BrokenReason>, ProcessOutput) {
    match process::run(command).await {
        Ok(output) => {
            let result = match output.code {
                Some(0) => Ok(()),
                Some(code) => Err(BrokenReason::Exited { code }),
                None => Err(BrokenReason::Signalled),
            };
            (result, output)
        }
        Err(ProcessError::TimedOut { after, .. }) => {
            (Err(BrokenReason::TimedOut { after }), ProcessOutput::default())
        }
        Err(e @ (ProcessError::Spawn { .. } | ProcessError::Wait { .. })) => (
            Err(BrokenReason::ProcessFailed {
                message: e.to_string(),
            }),
            ProcessOutput::default(),
        ),
    }
}

fn check_version(path: &Path, output: &ProcessOutput, minimum: Option<&str>) -> BootstrapOutcome {
    let Some(minimum) = minimum else {
        return BootstrapOutcome::Available {
            path: path.to_path_buf(),
            version: None,
        };
    };

    let version = find_version(&output.stdout).or_else(|| find_version(&output.stderr));

    match &version {
        Some(found) if is_older(found, minimum) => {
            return BootstrapOutcome::Broken {
                reason: BrokenReason::VersionTooOld {
                    found: found.clone(),
                    minimum: minimum.to_string(),
                },
            };
        }
        Some(_) => {}
        None => log::warn!(
            "Could not determine the version of '{}'; assuming it is supported",
            path.display()
        ),
    }

    BootstrapOutcome::Available {
        path: path.to_path_buf(),
        version,
    }
}

/// First dotted number in `text`, e.g. `24.1.0` in `black, 24.1.0 (compiled: yes)`.
fn find_version(text: &str) -> Option<String> {
    VERSION_PATTERN
        .find(text)
        .map(|x| x.as_str().to_string())
}

fn version_parts(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|x| x.parse().unwrap_or(0))
        .collect()
}

fn is_older(found: &str, minimum: &str) -> bool {
    let mut found = version_parts(found);
    let mut minimum = version_parts(minimum);
    let len = found.len().max(minimum.len());
    found.resize(len, 0);
    minimum.resize(len, 0);

    found < minimum
}
