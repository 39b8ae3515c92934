//! Project manifest discovery and configuration merging.
//!
//! Configuration lives in the `[tool.lint]` section of the nearest
//! `pyproject.toml`. Every catalog entry starts from its defaults and user
//! overrides are applied on top, key by key.

use std::{
    collections::BTreeMap,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr as _,
    time::Duration,
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use polylint_models::LinterName;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    bootstrap::RetryPolicy,
    registry::{self, LinterSpec},
};

/// Name of the manifest searched for upward from the working directory.
pub const MANIFEST_FILE: &str = "pyproject.toml";

/// Files in scope when the manifest does not say otherwise.
pub const DEFAULT_INCLUDE: &str = r"\.py$";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("\"{manifest}\" could not be located in the search paths: {search_paths:?}")]
    ManifestNotFound {
        manifest: String,
        search_paths: Vec<PathBuf>,
    },
    #[error("Failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid [tool.lint.{linter}] section: {source}")]
    InvalidLinter {
        linter: LinterName,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid include pattern '{pattern}': {source}")]
    InvalidInclude {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidExclude {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("Invalid jobs value 0: at least one worker is required")]
    InvalidJobs,
    #[error("Invalid timeout value 0: leave it unset to disable the timeout")]
    InvalidTimeout,
}

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    tool: ToolTable,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    lint: Option<LintSection>,
}

#[derive(Debug, Default, Deserialize)]
struct LintSection {
    include: Option<String>,
    exclude: Option<Vec<String>>,
    jobs: Option<usize>,
    timeout: Option<u64>,
    bootstrap: Option<BootstrapSection>,
    #[serde(flatten)]
    linters: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BootstrapSection {
    retries: Option<u32>,
    backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinterOverride {
    enabled: Option<bool>,
    run: Option<bool>,
    options: Option<Vec<String>>,
    include: Option<String>,
    executable: Option<String>,
}

/// A catalog entry with the user's overrides applied.
#[derive(Debug, Clone)]
pub struct ResolvedLinter {
    pub spec: &'static LinterSpec,
    pub enabled: bool,
    /// Binary name or path to execute
    pub executable: String,
    /// User options, passed after the catalog arguments
    pub options: Vec<String>,
    /// Narrows the files this tool sees; `None` inherits the global include
    pub include: Option<Regex>,
}

impl ResolvedLinter {
    fn from_spec(spec: &'static LinterSpec) -> Self {
        Self {
            spec,
            enabled: spec.default_enabled,
            executable: spec.executable.to_string(),
            options: vec![],
            include: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> LinterName {
        self.spec.name
    }

    /// Catalog arguments followed by the configured options.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.spec
            .args
            .iter()
            .copied()
            .chain(self.options.iter().map(String::as_str))
    }

    /// Whether this tool should see the file with the given slash-separated path.
    #[must_use]
    pub fn includes(&self, path: &str) -> bool {
        self.include.as_ref().is_none_or(|x| x.is_match(path))
    }

    fn apply(&mut self, config: LinterOverride) -> Result<(), ConfigError> {
        if let Some(enabled) = config.enabled {
            self.enabled = enabled;
        }
        // `run` is the historical spelling and wins over `enabled`
        if let Some(run) = config.run {
            self.enabled = run;
        }
        if let Some(options) = config.options {
            self.options = options;
        }
        if let Some(include) = config.include {
            self.include = Some(compile_include(&include)?);
        }
        if let Some(executable) = config.executable {
            self.executable = executable;
        }

        Ok(())
    }
}

/// Fully merged configuration for one invocation.
#[derive(Debug, Clone)]
pub struct LintConfig {
    /// Directory containing the manifest
    pub root: PathBuf,
    pub manifest: PathBuf,
    pub name: String,
    pub include: Regex,
    pub exclude: GlobSet,
    /// Every catalog entry in canonical order, enabled or not
    pub linters: Vec<ResolvedLinter>,
    pub jobs: NonZeroUsize,
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl LintConfig {
    /// Locates the nearest manifest from `start` upward and resolves it.
    ///
    /// # Errors
    ///
    /// * If no manifest exists in `start` or any of its ancestors
    /// * If the manifest cannot be read or parsed
    /// * If any configured value is invalid
    pub fn resolve(start: &Path) -> Result<Self, ConfigError> {
        let manifest = find_manifest(start)?;
        log::debug!("Loading file '{}'", manifest.display());

        let contents =
            std::fs::read_to_string(&manifest).map_err(|source| ConfigError::Read {
                path: manifest.clone(),
                source,
            })?;

        Self::parse(&manifest, &contents)
    }

    /// Builds the configuration from manifest contents.
    ///
    /// # Errors
    ///
    /// * If the contents are not valid TOML
    /// * If a linter section has unknown keys or wrongly typed values
    /// * If an include regex or exclude glob does not compile
    /// * If `jobs` or `timeout` is 0
    pub fn parse(manifest: &Path, contents: &str) -> Result<Self, ConfigError> {
        let document: Manifest = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: manifest.to_path_buf(),
            source,
        })?;
        let section = document.tool.lint.unwrap_or_default();

        let include = compile_include(section.include.as_deref().unwrap_or(DEFAULT_INCLUDE))?;
        let exclude = compile_exclude(section.exclude.as_deref().unwrap_or_default())?;

        let mut linters = registry::catalog()
            .iter()
            .map(ResolvedLinter::from_spec)
            .collect::<Vec<_>>();

        for (key, value) in section.linters {
            let Ok(name) = LinterName::from_str(&key) else {
                log::warn!("Ignoring unknown key '{key}' in [tool.lint]");
                continue;
            };
            let config = value
                .try_into::<LinterOverride>()
                .map_err(|source| ConfigError::InvalidLinter {
                    linter: name,
                    source,
                })?;
            log::trace!("Applying overrides for {name}: {config:?}");

            if let Some(linter) = linters.iter_mut().find(|x| x.name() == name) {
                linter.apply(config)?;
            }
        }

        let jobs = match section.jobs {
            Some(jobs) => NonZeroUsize::new(jobs).ok_or(ConfigError::InvalidJobs)?,
            None => std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
        };

        let timeout = match section.timeout {
            Some(0) => return Err(ConfigError::InvalidTimeout),
            timeout => timeout.map(Duration::from_secs),
        };

        let retry = section
            .bootstrap
            .map_or_else(RetryPolicy::default, |x| {
                let default = RetryPolicy::default();
                RetryPolicy {
                    retries: x.retries.unwrap_or(default.retries),
                    backoff: x.backoff_ms.map_or(default.backoff, Duration::from_millis),
                    max_backoff: x
                        .max_backoff_ms
                        .map_or(default.max_backoff, Duration::from_millis),
                }
            });

        let root = manifest
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let name = root
            .file_name()
            .map(|x| x.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self {
            root,
            manifest: manifest.to_path_buf(),
            name,
            include,
            exclude,
            linters,
            jobs,
            timeout,
            retry,
        })
    }

    /// Enabled linters in canonical execution order.
    pub fn enabled_linters(&self) -> impl Iterator<Item = &ResolvedLinter> {
        self.linters.iter().filter(|x| x.enabled)
    }

    #[must_use]
    pub fn linter(&self, name: LinterName) -> Option<&ResolvedLinter> {
        self.linters.iter().find(|x| x.name() == name)
    }

    /// Whether a slash-separated path is in scope for linting at all.
    #[must_use]
    pub fn is_in_scope(&self, path: &str) -> bool {
        self.include.is_match(path) && !self.exclude.is_match(path)
    }
}

/// Searches `start` and each of its ancestors for [`MANIFEST_FILE`].
///
/// # Errors
///
/// * [`ConfigError::ManifestNotFound`] if no directory contains the manifest
pub fn find_manifest(start: &Path) -> Result<PathBuf, ConfigError> {
    let start = std::path::absolute(start).unwrap_or_else(|_| start.to_path_buf());
    let search_paths = start.ancestors().map(Path::to_path_buf).collect::<Vec<_>>();

    search_paths
        .iter()
        .map(|x| x.join(MANIFEST_FILE))
        .find(|x| x.is_file())
        .ok_or_else(|| ConfigError::ManifestNotFound {
            manifest: MANIFEST_FILE.to_string(),
            search_paths,
        })
}

fn compile_include(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidInclude {
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_exclude(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidExclude {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }

    builder.build().map_err(|source| ConfigError::InvalidExclude {
        pattern: patterns.join(", "),
        source,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(contents: &str) -> Result<LintConfig, ConfigError> {
        LintConfig::parse(Path::new("/work/project/pyproject.toml"), contents)
    }

    fn enabled_names(config: &LintConfig) -> Vec<LinterName> {
        config.enabled_linters().map(ResolvedLinter::name).collect()
    }

    #[test_log::test]
    fn empty_manifest_uses_catalog_defaults() {
        let config = parse("").unwrap();

        assert_eq!(enabled_names(&config), LinterName::ORDER);
        assert_eq!(config.name, "project");
        assert_eq!(config.root, PathBuf::from("/work/project"));
        assert_eq!(config.include.as_str(), DEFAULT_INCLUDE);
        assert_eq!(config.timeout, None);
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.is_in_scope("src/a.py"));
        assert!(!config.is_in_scope("src/a.txt"));
    }

    #[test_log::test]
    fn other_tool_sections_are_ignored() {
        let config = parse(
            r#"
            [tool.poetry]
            name = "demo"

            [tool.black]
            line-length = 100
            "#,
        )
        .unwrap();

        assert_eq!(enabled_names(&config), LinterName::ORDER);
    }

    #[test_log::test]
    fn run_false_disables_linter() {
        let config = parse(
            r"
            [tool.lint]
            flake8 = { run = false }
            ",
        )
        .unwrap();

        assert!(!enabled_names(&config).contains(&LinterName::Flake8));
        assert_eq!(enabled_names(&config).len(), 5);
    }

    #[test_log::test]
    fn run_wins_over_enabled() {
        let config = parse(
            r"
            [tool.lint.pyright]
            enabled = false
            run = true
            ",
        )
        .unwrap();

        assert!(config.linter(LinterName::Pyright).unwrap().enabled);
    }

    #[test_log::test]
    fn options_are_appended_after_catalog_args() {
        let config = parse(
            r#"
            [tool.lint.black]
            options = ["--line-length", "100"]
            "#,
        )
        .unwrap();

        assert_eq!(
            config
                .linter(LinterName::Black)
                .unwrap()
                .args()
                .collect::<Vec<_>>(),
            vec!["-t", "py37", "--line-length", "100"]
        );
    }

    #[test_log::test]
    fn unspecified_keys_keep_defaults() {
        let config = parse(
            r#"
            [tool.lint.isort]
            executable = "/opt/bin/isort"
            "#,
        )
        .unwrap();
        let isort = config.linter(LinterName::Isort).unwrap();

        assert_eq!(isort.executable, "/opt/bin/isort");
        assert!(isort.enabled);
        assert!(isort.options.is_empty());
        assert!(isort.includes("anything.py"));
    }

    #[test_log::test]
    fn per_linter_include_narrows_files() {
        let config = parse(
            r#"
            [tool.lint]
            include = '\.pyi?$'

            [tool.lint.pyupgrade]
            include = '^src/'
            "#,
        )
        .unwrap();
        let pyupgrade = config.linter(LinterName::Pyupgrade).unwrap();

        assert!(config.is_in_scope("tests/a.pyi"));
        assert!(pyupgrade.includes("src/a.py"));
        assert!(!pyupgrade.includes("tests/a.py"));
    }

    #[test_log::test]
    fn exclude_globs_remove_files_from_scope() {
        let config = parse(
            r#"
            [tool.lint]
            exclude = ["**/migrations/**", "build/**"]
            "#,
        )
        .unwrap();

        assert!(config.is_in_scope("app/models.py"));
        assert!(!config.is_in_scope("app/migrations/0001.py"));
        assert!(!config.is_in_scope("build/lib/a.py"));
    }

    #[test_log::test]
    fn global_settings_are_read() {
        let config = parse(
            r"
            [tool.lint]
            jobs = 3
            timeout = 60

            [tool.lint.bootstrap]
            retries = 5
            backoff_ms = 10
            ",
        )
        .unwrap();

        assert_eq!(config.jobs.get(), 3);
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
        assert_eq!(
            config.retry,
            RetryPolicy {
                retries: 5,
                backoff: Duration::from_millis(10),
                max_backoff: RetryPolicy::default().max_backoff,
            }
        );
    }

    #[test_log::test]
    fn zero_jobs_is_rejected() {
        assert!(matches!(
            parse("[tool.lint]\njobs = 0\n"),
            Err(ConfigError::InvalidJobs)
        ));
    }

    #[test_log::test]
    fn zero_timeout_is_rejected() {
        assert!(matches!(
            parse("[tool.lint]\ntimeout = 0\n"),
            Err(ConfigError::InvalidTimeout)
        ));
    }

    #[test_log::test]
    fn unknown_linter_key_is_rejected() {
        let err = parse("[tool.lint.flake8]\nrun = false\nmutable = true\n").unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidLinter {
                linter: LinterName::Flake8,
                ..
            }
        ));
    }

    #[test_log::test]
    fn unknown_linter_table_is_ignored() {
        let config = parse("[tool.lint.mypy]\nrun = true\n").unwrap();

        assert_eq!(enabled_names(&config), LinterName::ORDER);
    }

    #[test_log::test]
    fn invalid_include_is_rejected() {
        assert!(matches!(
            parse("[tool.lint]\ninclude = '('\n"),
            Err(ConfigError::InvalidInclude { .. })
        ));
    }

    #[test_log::test]
    fn invalid_toml_is_rejected() {
        assert!(matches!(
            parse("[tool.lint\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test_log::test]
    fn find_manifest_walks_up_from_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "").unwrap();
        let nested = dir.path().join("src").join("pkg");
        std::fs::create_dir_all(&nested).unwrap();

        let manifest = find_manifest(&nested).unwrap();

        assert_eq!(manifest, dir.path().join(MANIFEST_FILE));
    }

    #[test_log::test]
    fn missing_manifest_names_the_file() {
        let dir = tempfile::tempdir().unwrap();

        let err = find_manifest(dir.path()).unwrap_err();

        // A manifest in an ancestor of the temp dir would make this test meaningless.
        if let ConfigError::ManifestNotFound { search_paths, .. } = &err {
            assert_eq!(search_paths.first().unwrap(), dir.path());
        } else {
            panic!("unexpected error: {err:?}");
        }
        assert!(
            err.to_string()
                .starts_with("\"pyproject.toml\" could not be located in the search paths")
        );
    }
}
