//! Static catalog of the supported tools.
//!
//! Each [`LinterName`] maps to exactly one [`LinterSpec`] describing how the
//! tool is probed, how it is invoked, and how its exit codes are interpreted.
//! The catalog is immutable; user configuration is layered on top of it by
//! [`crate::config`].

use polylint_models::{LinterName, LinterRole, ToolErrorReason, ToolStatus};

/// How a tool's non-zero exit codes should be read.
///
/// Exit code 0 always means the tool passed. Codes listed in `findings` mean
/// the tool found problems it could not resolve. Codes listed in `changes`
/// mean the tool rewrote the file. Any other code is a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodeSemantics {
    pub findings: &'static [i32],
    pub changes: &'static [i32],
}

impl ExitCodeSemantics {
    /// Maps a raw exit code to a status.
    ///
    /// `changed` must come from comparing the file before and after the
    /// invocation. A "made changes" code is only accepted when the file really
    /// changed, and a code listed as both a finding and a change is rejected.
    #[must_use]
    pub fn classify(&self, code: Option<i32>, changed: bool) -> ToolStatus {
        let Some(code) = code else {
            return ToolStatus::ToolError(ToolErrorReason::Signalled);
        };

        if code == 0 {
            return ToolStatus::Pass;
        }

        let finding = self.findings.contains(&code);
        let change = self.changes.contains(&code);

        match (finding, change) {
            (true, true) => ToolStatus::ToolError(ToolErrorReason::AmbiguousExit { code }),
            (false, true) if changed => ToolStatus::Pass,
            (false, true) => ToolStatus::ToolError(ToolErrorReason::AmbiguousExit { code }),
            (true, false) => ToolStatus::FindingsReported,
            (false, false) => ToolStatus::ToolError(ToolErrorReason::Crashed { code }),
        }
    }
}

/// Immutable description of a supported tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinterSpec {
    pub name: LinterName,
    /// Default binary name looked up on the search path
    pub executable: &'static str,
    /// Oldest supported version, when the probe output reports one
    pub minimum_version: Option<&'static str>,
    /// Arguments always passed before the user's options and the file
    pub args: &'static [&'static str],
    /// Arguments of the cheap command used to verify the tool is usable
    pub probe_args: &'static [&'static str],
    pub default_enabled: bool,
    pub role: LinterRole,
    pub exit_codes: ExitCodeSemantics,
    /// The tool downloads parts of itself on first use, so probes may fail
    /// transiently and are retried
    pub network_bootstrap: bool,
}

impl LinterSpec {
    #[must_use]
    pub fn is_fixer(&self) -> bool {
        self.role == LinterRole::Fixer
    }

    /// Classifies an invocation, additionally rejecting checkers that
    /// modified the file they were given.
    #[must_use]
    pub fn classify(&self, code: Option<i32>, changed: bool) -> ToolStatus {
        let status = self.exit_codes.classify(code, changed);

        if changed && !self.is_fixer() && !matches!(status, ToolStatus::ToolError(_)) {
            return ToolStatus::ToolError(ToolErrorReason::UnexpectedChange);
        }

        status
    }
}

const VERSION_PROBE: &[&str] = &["--version"];
const HELP_PROBE: &[&str] = &["--help"];

static CATALOG: [LinterSpec; 6] = [
    LinterSpec {
        name: LinterName::Isort,
        executable: "isort",
        minimum_version: Some("5.0.0"),
        args: &["--py", "37"],
        probe_args: VERSION_PROBE,
        default_enabled: true,
        role: LinterRole::Fixer,
        // 1: unsorted imports under `--check-only`
        exit_codes: ExitCodeSemantics {
            findings: &[1],
            changes: &[],
        },
        network_bootstrap: false,
    },
    LinterSpec {
        name: LinterName::Black,
        executable: "black",
        minimum_version: Some("22.1.0"),
        args: &["-t", "py37"],
        probe_args: VERSION_PROBE,
        default_enabled: true,
        role: LinterRole::Fixer,
        // 1: would reformat under `--check`, 123: internal error
        exit_codes: ExitCodeSemantics {
            findings: &[1],
            changes: &[],
        },
        network_bootstrap: false,
    },
    LinterSpec {
        name: LinterName::Pyupgrade,
        executable: "pyupgrade",
        // No `--version` flag
        minimum_version: None,
        args: &["--py37-plus"],
        probe_args: HELP_PROBE,
        default_enabled: true,
        role: LinterRole::Fixer,
        // 1: rewrote the file
        exit_codes: ExitCodeSemantics {
            findings: &[],
            changes: &[1],
        },
        network_bootstrap: false,
    },
    LinterSpec {
        name: LinterName::Flake8,
        executable: "flake8",
        minimum_version: Some("4.0.0"),
        args: &[],
        probe_args: VERSION_PROBE,
        default_enabled: true,
        role: LinterRole::Checker,
        exit_codes: ExitCodeSemantics {
            findings: &[1],
            changes: &[],
        },
        network_bootstrap: false,
    },
    LinterSpec {
        name: LinterName::Prospector,
        executable: "prospector",
        minimum_version: Some("1.7.0"),
        args: &[],
        probe_args: VERSION_PROBE,
        default_enabled: true,
        role: LinterRole::Checker,
        exit_codes: ExitCodeSemantics {
            findings: &[1],
            changes: &[],
        },
        network_bootstrap: false,
    },
    LinterSpec {
        name: LinterName::Pyright,
        executable: "pyright",
        minimum_version: Some("1.1.200"),
        args: &[],
        probe_args: VERSION_PROBE,
        default_enabled: true,
        role: LinterRole::Checker,
        // 2: fatal, 3: config error, 4: invalid arguments
        exit_codes: ExitCodeSemantics {
            findings: &[1],
            changes: &[],
        },
        network_bootstrap: true,
    },
];

/// Returns the catalog entry for a tool.
#[must_use]
pub fn spec(name: LinterName) -> &'static LinterSpec {
    // The catalog is laid out in declaration order of `LinterName`.
    &CATALOG[name as usize]
}

/// All catalog entries in canonical execution order.
#[must_use]
pub fn catalog() -> &'static [LinterSpec] {
    &CATALOG
}
