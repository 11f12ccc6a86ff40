//! Run command implementation
//!
//! Builds the artifact (into a temporary directory unless `--output` is
//! given) and launches an executor against one of its targets. The
//! executor's exit code becomes the exit code of `stitch`.
//!
//! The executor defaults to the `executor` common fact. The target defaults
//! to the first target of the main project whose extension the executor
//! handles.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use log::info;

use super::ProfileArgs;
use stitch::executor::{select_target, ExecutorRegistry};
use stitch::phases::{orchestrator, write};

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Target to run, as `project/path` or a path inside the main project
    #[arg(long, value_name = "TARGET")]
    pub target: Option<String>,

    /// Executor to run the target with
    #[arg(long, value_name = "NAME")]
    pub executor: Option<String>,

    /// Write the artifact here instead of a temporary directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Arguments passed on to the executor
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

/// Execute the run command, returning the executor's exit code
pub fn execute(args: RunArgs, profile_args: &ProfileArgs) -> Result<i32> {
    let profile = profile_args.load()?;
    let registry = ExecutorRegistry::new(&profile.executors);
    let composition = orchestrator::compose(&profile)?;

    let executor_name = args
        .executor
        .unwrap_or_else(|| composition.options.common().executor.clone());
    let executor = registry.get(&executor_name)?;

    let targets: Vec<String> = composition
        .target_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let main = composition.main().name().to_string();
    let target = match &args.target {
        Some(target) => resolve_target(&targets, &main, target)?,
        None => match select_target(&targets, &main, executor) {
            Some(target) => target.to_string(),
            None => bail!(
                "No target of project '{}' can be run by executor '{}' (extensions: {})",
                main,
                executor.name,
                executor.extensions.join(", ")
            ),
        },
    };

    let temp;
    let dir = match &args.output {
        Some(dir) => dir.clone(),
        None => {
            temp = tempfile::Builder::new().prefix("stitch-run-").tempdir()?;
            temp.path().to_path_buf()
        }
    };
    // The executor runs inside `dir`, so the target must not stay relative to it.
    let dir = std::path::absolute(&dir)?;
    write::materialize(&composition, &dir)?;

    info!("running {} with {}", target, executor.name);
    let code = executor.run(&dir.join(&target), &args.args, &dir)?;
    Ok(code)
}

/// Accept a full target or one relative to the main project.
fn resolve_target(targets: &[String], main: &str, requested: &str) -> Result<String> {
    let prefixed = format!("{}/{}", main, requested);
    for candidate in [requested, prefixed.as_str()] {
        if targets.iter().any(|target| target == candidate) {
            return Ok(candidate.to_string());
        }
    }
    bail!("Unknown target '{}'", requested)
}
