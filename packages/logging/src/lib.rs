#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt as _};

pub use log;

#[cfg(feature = "macros")]
pub mod macros;

const DEFAULT_LOG_LEVEL: &str = "polylint=warn";
const VERBOSE_LOG_LEVEL: &str = "polylint=debug";

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Picks the filter directive: `POLYLINT_LOG`, then `RUST_LOG`, then the
/// built-in default. `verbose` only changes the built-in default.
fn filter_directive(
    polylint_log: Option<String>,
    rust_log: Option<String>,
    verbose: bool,
) -> String {
    let set = |x: &String| !x.trim().is_empty();

    polylint_log
        .filter(set)
        .or_else(|| rust_log.filter(set))
        .unwrap_or_else(|| {
            if verbose {
                VERBOSE_LOG_LEVEL
            } else {
                DEFAULT_LOG_LEVEL
            }
            .to_string()
        })
}

/// Installs the global subscriber. Log records are written to stderr so that
/// stdout carries only the lint report.
///
/// # Errors
///
/// * If the filter directive from the environment is invalid
/// * If a global subscriber or `log` logger was already installed
pub fn init(verbose: bool) -> Result<(), InitError> {
    let directive = filter_directive(
        std::env::var("POLYLINT_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
        verbose,
    );

    let filter = EnvFilter::try_new(&directive)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish()
        .try_init()?;

    log::debug!("Logging initialized with filter '{directive}'");

    Ok(())
}
