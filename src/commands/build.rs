//! Build command implementation
//!
//! Runs a full composition and writes the artifact:
//! 1. Discover the project closure (options resolve, resources are scanned)
//! 2. Merge config fragments
//! 3. Render templates, link plain files and write `.stitch/` metadata

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Args;

use super::ProfileArgs;
use stitch::defaults::DEFAULT_OUTPUT_DIR;
use stitch::output::OutputConfig;
use stitch::phases::orchestrator;

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Compose and report without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the build command
pub fn execute(args: BuildArgs, profile_args: &ProfileArgs, output: &OutputConfig) -> Result<()> {
    let start_time = Instant::now();
    let profile = profile_args.load()?;

    let composition = if args.dry_run {
        orchestrator::compose(&profile)?
    } else {
        orchestrator::build(&profile, &args.output)?
    };

    if !args.quiet {
        let duration = start_time.elapsed();
        println!(
            "{} Composed {} projects in {:.2}s",
            output.marker("✔", "[ok]"),
            composition.order.len(),
            duration.as_secs_f64()
        );
        println!("   {} output targets", composition.targets.len());
        if args.dry_run {
            for target in composition.target_names() {
                println!("   {}", target);
            }
        } else {
            println!("   Files written to: {}", args.output.display());
        }
    }

    Ok(())
}
