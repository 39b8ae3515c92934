//! Data models shared by the `polylint` engine and its reporters.
//!
//! # Main Types
//!
//! * [`LinterName`] - The closed set of supported tools
//! * [`ToolStatus`] - Normalized outcome of a single tool invocation
//! * [`ToolInvocationResult`] - Everything observed about one (linter, file) pair
//! * [`FileReport`] / [`RunReport`] - Aggregated results in discovery order
//! * [`BootstrapOutcome`] - Result of verifying that a tool is usable

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::{fmt, path::PathBuf, time::Duration};

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// A supported external tool.
///
/// The declaration order of the variants is the canonical execution order:
/// import sorting, then formatting, then syntax upgrades, then the checkers.
/// Every fixer sorts before every checker.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum LinterName {
    Isort,
    Black,
    Pyupgrade,
    Flake8,
    Prospector,
    Pyright,
}

impl LinterName {
    /// All linters in canonical execution order.
    pub const ORDER: [Self; 6] = [
        Self::Isort,
        Self::Black,
        Self::Pyupgrade,
        Self::Flake8,
        Self::Prospector,
        Self::Pyright,
    ];
}

/// Whether a tool may rewrite the files it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LinterRole {
    /// Rewrites file content to resolve problems
    Fixer,
    /// Only reports problems
    Checker,
}

/// Why an invocation was classified as [`ToolStatus::ToolError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolErrorReason {
    /// The tool exited with a code its semantics do not account for
    Crashed { code: i32 },
    /// The tool was terminated by a signal
    Signalled,
    /// The tool did not finish within the configured timeout and was killed
    TimedOut { after: Duration },
    /// The target file could not be read before or after the invocation
    FileUnavailable { message: String },
    /// The tool could not be started or waited on
    ProcessFailed { message: String },
    /// A checker modified the file it was only supposed to inspect
    UnexpectedChange,
    /// The tool claimed to have made changes but the file content is identical
    AmbiguousExit { code: i32 },
}

impl fmt::Display for ToolErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crashed { code } => write!(f, "exited {code}"),
            Self::Signalled => f.write_str("terminated by a signal"),
            Self::TimedOut { after } => write!(f, "timed out after {}s", after.as_secs()),
            Self::FileUnavailable { message } => write!(f, "file unavailable ({message})"),
            Self::ProcessFailed { message } => write!(f, "could not be run ({message})"),
            Self::UnexpectedChange => f.write_str("was not expected to change files"),
            Self::AmbiguousExit { code } => {
                write!(f, "exited {code} claiming changes but the file is unchanged")
            }
        }
    }
}

/// Normalized status of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Pass,
    FindingsReported,
    ToolError(ToolErrorReason),
}

impl ToolStatus {
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// `Pass < FindingsReported < ToolError`; every error reason ranks the same.
    #[must_use]
    pub const fn severity(&self) -> u8 {
        match self {
            Self::Pass => 0,
            Self::FindingsReported => 1,
            Self::ToolError(_) => 2,
        }
    }
}

/// Everything observed about running one linter against one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocationResult {
    pub linter: LinterName,
    pub stdout: String,
    pub stderr: String,
    /// Raw process exit code; `None` when the process was killed, signalled,
    /// never started, or never ran because the file was unavailable
    pub exit_code: Option<i32>,
    pub status: ToolStatus,
    /// Whether the file content differs after the invocation
    pub changed: bool,
}

impl ToolInvocationResult {
    /// Result for a pair that could not run because the file was unreadable.
    #[must_use]
    pub fn file_unavailable(linter: LinterName, message: impl Into<String>) -> Self {
        Self {
            linter,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            status: ToolStatus::ToolError(ToolErrorReason::FileUnavailable {
                message: message.into(),
            }),
            changed: false,
        }
    }
}

/// All tool results for a single file, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub results: Vec<ToolInvocationResult>,
}

impl FileReport {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self {
            path,
            results: vec![],
        }
    }

    /// The worst status among the results, [`ToolStatus::Pass`] when empty.
    #[must_use]
    pub fn status(&self) -> ToolStatus {
        self.results
            .iter()
            .map(|x| &x.status)
            .max_by_key(|x| x.severity())
            .cloned()
            .unwrap_or(ToolStatus::Pass)
    }

    #[must_use]
    pub fn changed(&self) -> bool {
        self.results.iter().any(|x| x.changed)
    }
}

/// Outcome of verifying that a tool is installed and usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Available {
        path: PathBuf,
        version: Option<String>,
    },
    Missing,
    Broken {
        reason: BrokenReason,
    },
    /// A network-dependent probe kept failing until the retries ran out
    TransientFailure {
        attempts: u32,
        reason: BrokenReason,
    },
}

impl BootstrapOutcome {
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

/// Why a version probe was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokenReason {
    Exited { code: i32 },
    Signalled,
    TimedOut { after: Duration },
    ProcessFailed { message: String },
    VersionTooOld { found: String, minimum: String },
}

impl fmt::Display for BrokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited { code } => write!(f, "exited {code}"),
            Self::Signalled => f.write_str("terminated by a signal"),
            Self::TimedOut { after } => write!(f, "timed out after {}s", after.as_secs()),
            Self::ProcessFailed { message } => write!(f, "could not be run ({message})"),
            Self::VersionTooOld { found, minimum } => {
                write!(f, "version {found} is older than the minimum {minimum}")
            }
        }
    }
}

/// Bootstrap outcome for one linter together with the probe's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapResult {
    pub linter: LinterName,
    pub outcome: BootstrapOutcome,
    pub stdout: String,
    pub stderr: String,
}

/// Bootstrap results for every enabled linter, in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub results: Vec<BootstrapResult>,
}

impl BootstrapReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|x| x.outcome.is_available())
    }

    pub fn failures(&self) -> impl Iterator<Item = &BootstrapResult> {
        self.results.iter().filter(|x| !x.outcome.is_available())
    }
}

/// The result of a complete lint run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub bootstrap: BootstrapReport,
    pub files: Vec<FileReport>,
}

impl RunReport {
    /// `true` when every invocation across every file passed.
    ///
    /// Vacuously `true` when there were no files or no enabled linters.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.files.iter().all(|x| x.status().is_pass())
    }

    /// 0 when every invocation passed, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_success())
    }
}
