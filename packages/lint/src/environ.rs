//! Extra environment variables passed to individual tools.
//!
//! Variables are set on the child process only; the environment of the
//! orchestrator itself is never modified.

use std::{ffi::OsString, path::PathBuf};

use polylint_models::LinterName;

pub const PYRIGHT_ENV_DIR: &str = "PYRIGHT_PYTHON_ENV_DIR";
pub const PYRIGHT_GLOBAL_NODE: &str = "PYRIGHT_PYTHON_GLOBAL_NODE";
const XDG_DATA_HOME: &str = "XDG_DATA_HOME";

/// Environment for every invocation of `linter`, probes included.
#[must_use]
pub fn tool_env(linter: LinterName) -> Vec<(&'static str, OsString)> {
    match linter {
        LinterName::Pyright => pyright_env(
            std::env::var_os(PYRIGHT_ENV_DIR),
            data_home(std::env::var_os(XDG_DATA_HOME), dirs::home_dir()),
        ),
        LinterName::Isort
        | LinterName::Black
        | LinterName::Pyupgrade
        | LinterName::Flake8
        | LinterName::Prospector => vec![],
    }
}

/// `$XDG_DATA_HOME`, else `~/.local/share`, on every platform.
fn data_home(xdg_data_home: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    xdg_data_home
        .filter(|x| !x.is_empty())
        .map(PathBuf::from)
        .or_else(|| home.map(|x| x.join(".local").join("share")))
}

/// Pins pyright's downloaded node environment to a stable cache directory
/// and keeps it from picking up a globally installed node.
fn pyright_env(
    explicit_dir: Option<OsString>,
    data_dir: Option<PathBuf>,
) -> Vec<(&'static str, OsString)> {
    let env_dir = explicit_dir
        .filter(|x| !x.is_empty())
        .map(PathBuf::from)
        .or_else(|| data_dir.map(|x| x.join("pyright")))
        .map(|x| std::path::absolute(&x).unwrap_or(x));

    let mut env = vec![(PYRIGHT_GLOBAL_NODE, OsString::from("off"))];

    if let Some(env_dir) = env_dir {
        env.push((PYRIGHT_ENV_DIR, env_dir.into_os_string()));
    } else {
        log::warn!("No data directory available; pyright will choose its own environment directory");
    }

    env
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn only_pyright_gets_extra_environment() {
        for linter in LinterName::ORDER {
            if linter != LinterName::Pyright {
                assert!(tool_env(linter).is_empty(), "{linter}");
            }
        }
    }

    #[test_log::test]
    fn explicit_env_dir_wins() {
        assert_eq!(
            pyright_env(
                Some(OsString::from("/cache/pyright-env")),
                Some(PathBuf::from("/home/ci/.local/share")),
            ),
            vec![
                (PYRIGHT_GLOBAL_NODE, OsString::from("off")),
                (PYRIGHT_ENV_DIR, OsString::from("/cache/pyright-env")),
            ]
        );
    }

    #[test_log::test]
    fn defaults_to_data_dir() {
        assert_eq!(
            pyright_env(None, Some(PathBuf::from("/home/ci/.local/share"))),
            vec![
                (PYRIGHT_GLOBAL_NODE, OsString::from("off")),
                (PYRIGHT_ENV_DIR, OsString::from("/home/ci/.local/share/pyright")),
            ]
        );
    }

    #[test_log::test]
    fn empty_explicit_dir_is_ignored() {
        assert_eq!(
            pyright_env(Some(OsString::new()), Some(PathBuf::from("/data"))),
            vec![
                (PYRIGHT_GLOBAL_NODE, OsString::from("off")),
                (PYRIGHT_ENV_DIR, OsString::from("/data/pyright")),
            ]
        );
    }

    #[test_log::test]
    fn data_home_prefers_xdg_data_home() {
        assert_eq!(
            data_home(
                Some(OsString::from("/xdg/data")),
                Some(PathBuf::from("/Users/ci"))
            ),
            Some(PathBuf::from("/xdg/data"))
        );
    }

    #[test_log::test]
    fn data_home_falls_back_to_local_share() {
        assert_eq!(
            data_home(None, Some(PathBuf::from("/Users/ci"))),
            Some(PathBuf::from("/Users/ci/.local/share"))
        );
        assert_eq!(
            data_home(Some(OsString::new()), Some(PathBuf::from("/home/ci"))),
            Some(PathBuf::from("/home/ci/.local/share"))
        );
        assert_eq!(data_home(None, None), None);
    }

    #[test_log::test]
    fn global_node_is_always_disabled() {
        assert_eq!(
            pyright_env(None, None),
            vec![(PYRIGHT_GLOBAL_NODE, OsString::from("off"))]
        );
    }
}
