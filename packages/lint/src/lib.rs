//! Multi-tool lint orchestration for CI pipelines.
//!
//! `polylint` runs a fixed chain of Python fixers and checkers over a set of
//! files and folds their exit codes into a single pass/fail result. A run
//! consists of the following phases:
//!
//! 1. [`config`] locates `pyproject.toml` and merges `[tool.lint]` onto the
//!    [`registry`] catalog
//! 2. [`discovery`] expands the path arguments into files
//! 3. [`bootstrap`] verifies that every enabled tool is usable
//! 4. [`engine`] runs the tools file by file, detecting modifications
//! 5. [`report`] renders the results
//!
//! Infrastructure problems (a missing manifest, a missing or broken tool)
//! stop the run before any file is touched.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::{
    ffi::OsString,
    io::Write,
    num::NonZeroUsize,
    path::PathBuf,
    sync::Arc,
};

use polylint_models::{BootstrapReport, RunReport};
use thiserror::Error;
use tokio::task::JoinError;

use crate::{
    bootstrap::BootstrapContext,
    config::{ConfigError, LintConfig, ResolvedLinter},
    engine::ExecutionPlan,
};

pub mod bootstrap;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod environ;
pub mod process;
pub mod registry;
pub mod report;
pub mod snapshot;

#[cfg(all(test, unix))]
mod test_utils;

pub use polylint_models as models;

#[derive(Debug, Error)]
pub enum LintError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{} tool(s) failed to bootstrap", .0.failures().count())]
    Bootstrap(BootstrapReport),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Join(#[from] JoinError),
}

/// One command-line invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Directory the manifest search starts from and paths are relative to
    pub cwd: PathBuf,
    pub paths: Vec<PathBuf>,
    /// Report bootstrap progress explicitly, even when there is nothing to lint
    pub bootstrap: bool,
    /// Overrides the configured number of concurrent file workers
    pub jobs: Option<NonZeroUsize>,
    /// Replaces `PATH` when locating tools
    pub search_path: Option<OsString>,
}

impl Invocation {
    #[must_use]
    pub const fn new(cwd: PathBuf, paths: Vec<PathBuf>) -> Self {
        Self {
            cwd,
            paths,
            bootstrap: false,
            jobs: None,
            search_path: None,
        }
    }
}

/// Runs the complete pipeline, writing progress and results to `out`.
///
/// # Errors
///
/// * [`LintError::Config`] if the manifest is missing or invalid
/// * [`LintError::Bootstrap`] if an enabled tool is missing or broken
/// * [`LintError::Io`] if writing to `out` fails
/// * [`LintError::Join`] if a worker task panics
pub async fn lint(invocation: &Invocation, out: &mut impl Write) -> Result<RunReport, LintError> {
    let mut config = LintConfig::resolve(&invocation.cwd)?;
    if let Some(jobs) = invocation.jobs {
        config.jobs = jobs;
    }
    log::debug!(
        "Linting project '{}' configured by '{}'",
        config.name,
        config.manifest.display()
    );

    let files = discovery::discover(&invocation.cwd, &invocation.paths, &config);

    if files.is_empty() && !invocation.bootstrap {
        report::write_file_list(out, &files)?;
        return Ok(RunReport::default());
    }

    if invocation.bootstrap {
        report::write_bootstrap_progress(out, config.enabled_linters().map(ResolvedLinter::name))?;
    }

    let context = BootstrapContext::new(
        &config,
        &invocation.cwd,
        invocation.search_path.as_deref(),
    );
    let bootstrap = bootstrap::bootstrap(&config, &context).await?;

    if !bootstrap.is_success() {
        return Err(LintError::Bootstrap(bootstrap));
    }
    if invocation.bootstrap {
        writeln!(out, "{}", report::BOOTSTRAP_SUCCEEDED)?;
    }

    report::write_file_list(out, &files)?;
    if files.is_empty() {
        return Ok(RunReport {
            bootstrap,
            files: vec![],
        });
    }

    let plan = ExecutionPlan::new(&config, invocation.cwd.clone(), &bootstrap);
    let files = engine::execute(Arc::new(plan), files).await?;
    log::debug!(
        "Fixers modified {} of {} file(s)",
        files.iter().filter(|x| x.changed()).count(),
        files.len()
    );
    let run = RunReport { bootstrap, files };

    report::write_results(out, &run)?;
    out.flush()?;

    Ok(run)
}

/// Runs [`lint`] and maps the outcome to the process exit code: 0 when every
/// tool passed on every file, 1 otherwise.
///
/// # Errors
///
/// * If writing a failure message to `out` fails
pub async fn run(invocation: &Invocation, out: &mut impl Write) -> std::io::Result<i32> {
    match lint(invocation, out).await {
        Ok(run) => Ok(run.exit_code()),
        Err(LintError::Bootstrap(bootstrap)) => {
            report::write_bootstrap_failures(out, &bootstrap)?;
            Ok(1)
        }
        Err(LintError::Config(e)) => {
            writeln!(out, "{e}")?;
            Ok(1)
        }
        Err(e @ (LintError::Io(_) | LintError::Join(_))) => {
            log::error!("Linting aborted: {e}");
            writeln!(out, "{}", report::LINT_FAILED)?;
            Ok(1)
        }
    }
}
