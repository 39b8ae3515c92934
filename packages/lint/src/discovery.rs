//! Expansion of command-line path arguments into the set of files to lint.

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

use walkdir::WalkDir;

use crate::config::LintConfig;

/// A file selected for linting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileTarget {
    /// Path in the form the user gave it, with `.` components removed
    pub path: PathBuf,
    /// `path` resolved against the invocation directory
    pub absolute: PathBuf,
}

impl FileTarget {
    /// Slash-separated form of [`Self::path`], used for pattern matching and output.
    #[must_use]
    pub fn display_path(&self) -> String {
        slash_path(&self.path)
    }
}

/// Expands `paths` into a sorted, deduplicated list of files.
///
/// Arguments naming the same file in different ways (relative, absolute,
/// through `..` or a symlink) yield one target, spelled as first given.
/// Directories are walked recursively without following symlinks. A file is
/// kept when the configured include pattern matches its slash-separated path
/// and no exclude glob does. Arguments that do not exist are skipped.
#[must_use]
pub fn discover(cwd: &Path, paths: &[PathBuf], config: &LintConfig) -> Vec<FileTarget> {
    let mut targets = BTreeMap::new();

    for arg in paths {
        let path = normalize(arg);
        let absolute = cwd.join(&path);

        if !absolute.exists() {
            log::warn!("Skipping '{}': no such file or directory", arg.display());
            continue;
        }

        if absolute.is_dir() {
            for entry in WalkDir::new(&absolute).follow_links(false) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("Skipping unreadable entry under '{}': {e}", arg.display());
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&absolute) else {
                    continue;
                };
                let target = FileTarget {
                    path: normalize(&path.join(relative)),
                    absolute: entry.path().to_path_buf(),
                };
                insert(&mut targets, target, config);
            }
        } else if absolute.is_file() {
            insert(&mut targets, FileTarget { path, absolute }, config);
        }
    }

    log::debug!("Discovered {} file(s) from {} path(s)", targets.len(), paths.len());

    let mut targets = targets.into_values().collect::<Vec<_>>();
    targets.sort();
    targets
}

/// Adds `target` keyed by the file it resolves to.
fn insert(targets: &mut BTreeMap<PathBuf, FileTarget>, target: FileTarget, config: &LintConfig) {
    let display = target.display_path();

    if !config.is_in_scope(&display) {
        log::trace!("Ignoring '{display}': out of scope");
        return;
    }

    let key = std::fs::canonicalize(&target.absolute).unwrap_or_else(|e| {
        log::debug!("Could not resolve '{display}': {e}");
        target.absolute.clone()
    });

    targets.entry(key).or_insert(target);
}

/// Removes `.` components while keeping the path otherwise as given.
fn normalize(path: &Path) -> PathBuf {
    let normalized = path
        .components()
        .filter(|x| !matches!(x, Component::CurDir))
        .collect::<PathBuf>();

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "/")
}
