//! Temporary projects with fake tool executables for unit tests.

use std::{
    os::unix::fs::PermissionsExt as _,
    path::{Path, PathBuf},
};

use polylint_models::LinterName;
use tempfile::TempDir;

use crate::config::{LintConfig, MANIFEST_FILE};

pub struct FakeProject {
    dir: TempDir,
}

impl FakeProject {
    pub fn new(manifest: &str) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), manifest).unwrap();
        std::fs::create_dir(dir.path().join("bin")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn bin(&self) -> PathBuf {
        self.root().join("bin")
    }

    pub fn config(&self) -> LintConfig {
        LintConfig::resolve(self.root()).unwrap()
    }

    pub fn file(&self, path: &str, contents: &str) -> &Self {
        let path = self.root().join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
        self
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.root().join(path)).unwrap()
    }

    /// Installs a tool that answers the `--version` and `--help` probes and otherwise runs `body`
    /// with the target file (the last argument) in `$f`.
    pub fn tool(&self, name: &str, body: &str) -> &Self {
        self.script(
            name,
            &format!("case \"$1\" in --version|--help)\n  echo '{name} 99.0.0'\n  exit 0;;\nesac\nfor f; do :; done\n{body}"),
        )
    }

    /// Installs an executable shell script named `name` into the fake `bin`
    /// directory.
    pub fn script(&self, name: &str, body: &str) -> &Self {
        let path = self.bin().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        self
    }

    /// Number of times a tool script ran [`RECORD`] so far.
    pub fn calls(&self, name: &str) -> usize {
        std::fs::read_to_string(self.bin().join(format!("{name}.calls")))
            .map_or(0, |x| x.lines().count())
    }
}

/// Script line appending one line per call to `<tool>.calls`.
pub const RECORD: &str = "echo \"$*\" >> \"$0.calls\"";

/// Manifest enabling only `linters`.
pub fn only(linters: &[LinterName]) -> String {
    LinterName::ORDER
        .iter()
        .filter(|x| !linters.contains(x))
        .map(|x| format!("[tool.lint.{x}]\nrun = false\n\n"))
        .collect()
}
