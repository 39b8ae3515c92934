//! Execution of the enabled tools against the discovered files.
//!
//! Files are processed concurrently, bounded by the configured number of
//! jobs. Within one file the tools run strictly one after another in
//! canonical order so that every fixer sees the output of the previous one.
//! Each invocation is bracketed by content snapshots of the file.

use std::{num::NonZeroUsize, path::PathBuf, sync::Arc, time::Duration};

use polylint_models::{
    BootstrapOutcome, BootstrapReport, FileReport, ToolErrorReason, ToolInvocationResult,
    ToolStatus,
};
use tokio::{
    sync::Semaphore,
    task::{JoinError, JoinSet},
};

use crate::{
    config::{LintConfig, ResolvedLinter},
    discovery::FileTarget,
    environ,
    process::{self, ProcessError, ToolCommand},
    snapshot::FileSnapshot,
};

/// An enabled linter together with the executable found during bootstrap.
#[derive(Debug, Clone)]
pub struct PlannedLinter {
    pub linter: ResolvedLinter,
    pub program: PathBuf,
}

/// Everything the engine needs, independent of the configuration source.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Directory the tools run in; file paths are passed relative to it
    pub cwd: PathBuf,
    /// Linters in canonical order
    pub linters: Vec<PlannedLinter>,
    pub jobs: NonZeroUsize,
    pub timeout: Option<Duration>,
}

impl ExecutionPlan {
    /// Pairs every enabled linter with the executable its bootstrap found.
    ///
    /// Linters that were not bootstrapped successfully are left out; callers
    /// are expected to stop before execution when bootstrap failed.
    #[must_use]
    pub fn new(config: &LintConfig, cwd: PathBuf, bootstrap: &BootstrapReport) -> Self {
        let linters = config
            .enabled_linters()
            .filter_map(|linter| {
                let program = bootstrap.results.iter().find_map(|x| match &x.outcome {
                    BootstrapOutcome::Available { path, .. } if x.linter == linter.name() => {
                        Some(path.clone())
                    }
                    _ => None,
                });
                if program.is_none() {
                    log::warn!("{} was not bootstrapped and will not run", linter.name());
                }
                program.map(|program| PlannedLinter {
                    linter: linter.clone(),
                    program,
                })
            })
            .collect();

        Self {
            cwd,
            linters,
            jobs: config.jobs,
            timeout: config.timeout,
        }
    }
}

/// Lints every file and returns one report per file, in the order given.
///
/// # Errors
///
/// * If a file task panics
pub async fn execute(
    plan: Arc<ExecutionPlan>,
    files: Vec<FileTarget>,
) -> Result<Vec<FileReport>, JoinError> {
    let semaphore = Arc::new(Semaphore::new(plan.jobs.get()));
    let mut tasks = JoinSet::new();
    let mut slots = vec![None; files.len()];

    log::debug!(
        "Linting {} file(s) with {} linter(s) and {} job(s)",
        files.len(),
        plan.linters.len(),
        plan.jobs
    );

    for (index, file) in files.into_iter().enumerate() {
        let plan = plan.clone();
        let semaphore = semaphore.clone();

        tasks.spawn(async move {
            // The semaphore is never closed
            let _permit = semaphore.acquire_owned().await.ok();
            (index, lint_file(&plan, &file).await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (index, report) = joined?;
        slots[index] = Some(report);
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Runs every planned linter against one file in order.
pub async fn lint_file(plan: &ExecutionPlan, file: &FileTarget) -> FileReport {
    let display = file.display_path();
    let mut report = FileReport::new(file.path.clone());

    for planned in &plan.linters {
        if !planned.linter.includes(&display) {
            log::trace!("{} skips '{display}'", planned.linter.name());
            continue;
        }

        let result = invoke(plan, planned, file).await;
        log::debug!(
            "{} on '{display}': {:?} (changed: {})",
            result.linter,
            result.status,
            result.changed
        );
        report.results.push(result);
    }

    report
}

async fn invoke(
    plan: &ExecutionPlan,
    planned: &PlannedLinter,
    file: &FileTarget,
) -> ToolInvocationResult {
    let name = planned.linter.name();

    let before = match FileSnapshot::take(&file.absolute).await {
        Ok(snapshot) => snapshot,
        Err(e) => return ToolInvocationResult::file_unavailable(name, e.to_string()),
    };

    let command = ToolCommand::new(&planned.program, &plan.cwd)
        .args(planned.linter.args())
        .arg(file.path.as_os_str())
        .envs(environ::tool_env(name))
        .timeout(plan.timeout);

    let outcome = process::run(&command).await;
    let after = FileSnapshot::take(&file.absolute).await;
    let changed = after.as_ref().map_or(true, |x| *x != before);

    let (exit_code, stdout, stderr, status) = match outcome {
        Ok(output) => {
            let status = planned.linter.spec.classify(output.code, changed);
            (output.code, output.stdout, output.stderr, status)
        }
        Err(ProcessError::TimedOut { after, .. }) => (
            None,
            String::new(),
            String::new(),
            ToolStatus::ToolError(ToolErrorReason::TimedOut { after }),
        ),
        Err(e @ (ProcessError::Spawn { .. } | ProcessError::Wait { .. })) => (
            None,
            String::new(),
            String::new(),
            ToolStatus::ToolError(ToolErrorReason::ProcessFailed {
                message: e.to_string(),
            }),
        ),
    };

    let status = match after {
        Ok(_) => status,
        Err(e) => ToolStatus::ToolError(ToolErrorReason::FileUnavailable {
            message: e.to_string(),
        }),
    };

    ToolInvocationResult {
        linter: name,
        stdout,
        stderr,
        exit_code,
        status,
        changed,
    }
}
