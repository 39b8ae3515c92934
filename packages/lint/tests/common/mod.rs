#![allow(dead_code)]

use std::{
    os::unix::fs::PermissionsExt as _,
    path::{Path, PathBuf},
};

use polylint::{Invocation, models::LinterName};
use tempfile::TempDir;

/// A throwaway project with its own `bin` directory of fake tools, which is
/// the only place tools are looked up.
pub struct Project {
    dir: TempDir,
}

/// What a single `polylint` run printed and returned.
pub struct Outcome {
    pub code: i32,
    pub output: String,
}

impl Project {
    /// A project with a manifest.
    pub fn new(manifest: &str) -> Self {
        let project = Self::without_manifest();
        project.file("pyproject.toml", manifest);
        project
    }

    pub fn without_manifest() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("bin")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
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

    /// A tool that answers probes with version 99.0.0 and otherwise runs `body` with
    /// the target file in `$f`.
    pub fn tool(&self, name: &str, body: &str) -> &Self {
        self.script(
            name,
            &format!(
                "case \"$1\" in --version|--help)\n  echo '{name} 99.0.0'\n  exit 0;;\nesac\n\
                 for f; do :; done\n\
                 echo \"$f\" >> \"$0.calls\"\n\
                 {body}"
            ),
        )
    }

    /// Passing tools for every linter not installed yet.
    pub fn passing_tools(&self) -> &Self {
        for linter in LinterName::ORDER {
            if !self.bin().join(linter.as_ref()).exists() {
                self.tool(linter.as_ref(), "");
            }
        }
        self
    }

    pub fn script(&self, name: &str, body: &str) -> &Self {
        let path = self.bin().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        self
    }

    pub fn bin(&self) -> PathBuf {
        self.root().join("bin")
    }

    /// Files a tool was invoked on, in invocation order.
    pub fn calls(&self, name: &str) -> Vec<String> {
        std::fs::read_to_string(self.bin().join(format!("{name}.calls")))
            .map(|x| x.lines().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    pub async fn lint(&self, paths: &[&str]) -> Outcome {
        self.run(paths, false).await
    }

    pub async fn bootstrap(&self, paths: &[&str]) -> Outcome {
        self.run(paths, true).await
    }

    async fn run(&self, paths: &[&str], bootstrap: bool) -> Outcome {
        let invocation = Invocation {
            bootstrap,
            search_path: Some(self.bin().into_os_string()),
            ..Invocation::new(
                self.root().to_path_buf(),
                paths.iter().map(PathBuf::from).collect(),
            )
        };
        let mut out = vec![];

        let code = polylint::run(&invocation, &mut out).await.unwrap();

        Outcome {
            code,
            output: String::from_utf8(out).unwrap(),
        }
    }
}

/// Manifest enabling only `linters`.
pub fn only(linters: &[LinterName]) -> String {
    let mut manifest = "[tool.lint]\n".to_string();
    for linter in LinterName::ORDER {
        if !linters.contains(&linter) {
            manifest.push_str(&format!("{linter} = {{ run = false }}\n"));
        }
    }
    manifest
}
