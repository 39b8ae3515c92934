//! Textual rendering of bootstrap outcomes and lint results.
//!
//! Tool output is echoed line by line with the tool name as prefix, marked
//! `¹` for stdout and `²` for stderr.

use std::io::{self, Write};

use polylint_models::{
    BootstrapOutcome, BootstrapReport, BootstrapResult, BrokenReason, FileReport, LinterName,
    RunReport, ToolErrorReason, ToolInvocationResult, ToolStatus,
};

use crate::discovery::FileTarget;

pub const NO_FILES: &str = "No files to lint.";
pub const BOOTSTRAP_FAILED: &str = "Linting bootstrap failed.";
pub const BOOTSTRAP_SUCCEEDED: &str = "Bootstrapping finished successfully.";
pub const LINT_FAILED: &str = "Linting failed.";
pub const LINT_SUCCEEDED: &str = "Linting ran successfully";

/// # Errors
///
/// * If writing to `out` fails
pub fn write_bootstrap_progress(
    out: &mut impl Write,
    linters: impl IntoIterator<Item = LinterName>,
) -> io::Result<()> {
    for linter in linters {
        writeln!(out, "Bootstrapping {linter} ...")?;
    }
    Ok(())
}

/// Writes one line per unusable tool followed by its probe output, then the
/// bootstrap verdict.
///
/// # Errors
///
/// * If writing to `out` fails
pub fn write_bootstrap_failures(out: &mut impl Write, report: &BootstrapReport) -> io::Result<()> {
    for result in report.failures() {
        writeln!(out, "{}", bootstrap_failure(result))?;
        write_output(out, result.linter, &result.stdout, &result.stderr, "")?;
    }
    writeln!(out, "{BOOTSTRAP_FAILED}")
}

fn bootstrap_failure(result: &BootstrapResult) -> String {
    let linter = result.linter;

    match &result.outcome {
        BootstrapOutcome::Available { .. } => format!("{linter} is available"),
        BootstrapOutcome::Missing => format!("{linter} is missing"),
        BootstrapOutcome::Broken {
            reason: BrokenReason::Exited { code },
        } => format!("{linter} is broken and exited {code}"),
        BootstrapOutcome::Broken { reason } => format!("{linter} is broken: {reason}"),
        BootstrapOutcome::TransientFailure { attempts, reason } => {
            format!("{linter} is broken: still failing after {attempts} attempts ({reason})")
        }
    }
}

/// # Errors
///
/// * If writing to `out` fails
pub fn write_file_list(out: &mut impl Write, files: &[FileTarget]) -> io::Result<()> {
    if files.is_empty() {
        return writeln!(out, "{NO_FILES}");
    }

    writeln!(out, "Linting the following files:")?;
    for file in files {
        writeln!(out, "- {}", file.display_path())?;
    }
    Ok(())
}

/// Writes the per-file results and the final verdict.
///
/// # Errors
///
/// * If writing to `out` fails
pub fn write_results(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    if !report.files.is_empty() {
        writeln!(out, "Results:")?;
    }

    for file in &report.files {
        write_file(out, file)?;
    }

    if report.is_success() {
        writeln!(out, "{LINT_SUCCEEDED}")
    } else {
        writeln!(out, "{LINT_FAILED}")
    }
}

fn write_file(out: &mut impl Write, file: &FileReport) -> io::Result<()> {
    let path = file.path.to_string_lossy();
    writeln!(out, "- {path}")?;

    for result in &file.results {
        if result.changed {
            writeln!(out, "  {} modified {path}", result.linter)?;
        }
        if let Some(line) = status_line(result) {
            writeln!(out, "  {line}")?;
            write_output(out, result.linter, &result.stdout, &result.stderr, "  ")?;
        }
    }

    Ok(())
}

fn status_line(result: &ToolInvocationResult) -> Option<String> {
    let linter = result.linter;

    match &result.status {
        ToolStatus::Pass => None,
        ToolStatus::FindingsReported => Some(match result.exit_code {
            Some(code) => format!("{linter} found errors and exited {code}"),
            None => format!("{linter} found errors"),
        }),
        ToolStatus::ToolError(ToolErrorReason::Crashed { code }) => {
            Some(format!("{linter} is broken and exited {code}"))
        }
        ToolStatus::ToolError(reason) => Some(format!("{linter} is broken: {reason}")),
    }
}

fn write_output(
    out: &mut impl Write,
    linter: LinterName,
    stdout: &str,
    stderr: &str,
    indent: &str,
) -> io::Result<()> {
    for line in stdout.lines() {
        writeln!(out, "{indent}{linter}¹: {line}")?;
    }
    for line in stderr.lines() {
        writeln!(out, "{indent}{linter}²: {line}")?;
    }
    Ok(())
}
