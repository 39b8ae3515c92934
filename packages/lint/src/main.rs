#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::{num::NonZeroUsize, path::PathBuf};

use clap::Parser;
use polylint::Invocation;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Verify that every enabled tool is installed and report progress
    #[arg(long)]
    bootstrap: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Number of files linted concurrently
    #[arg(short, long)]
    jobs: Option<NonZeroUsize>,

    /// Files and directories to lint
    paths: Vec<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    polylint_logging::init(args.verbose).expect("Failed to initialize logging");

    let code = match std::env::current_dir() {
        Ok(cwd) => {
            let invocation = Invocation {
                bootstrap: args.bootstrap,
                jobs: args.jobs,
                ..Invocation::new(cwd, args.paths)
            };
            let mut stdout = std::io::stdout().lock();

            polylint::run(&invocation, &mut stdout).await.unwrap_or_else(|e| {
                log::error!("Failed to write output: {e}");
                1
            })
        }
        Err(e) => {
            log::error!("Failed to determine the working directory: {e}");
            1
        }
    };

    std::process::exit(code);
}
