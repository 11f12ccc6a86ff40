//! Config command implementation
//!
//! Prints the merged config of the composed project set, or its trace (the
//! file that last wrote each leaf), as YAML or JSON.

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde_json::Value as JsonValue;

use super::ProfileArgs;
use stitch::phases::orchestrator;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

/// Print the merged config
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print the trace instead of the values
    #[arg(long)]
    pub trace: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = ConfigFormat::Yaml)]
    pub format: ConfigFormat,
}

/// Execute the config command
pub fn execute(args: ConfigArgs, profile_args: &ProfileArgs) -> Result<()> {
    let profile = profile_args.load()?;
    let composition = orchestrator::compose(&profile)?;

    let tree = if args.trace {
        &composition.merged.trace
    } else {
        &composition.merged.value
    };
    print!("{}", render(tree, args.format)?);
    Ok(())
}

fn render(tree: &JsonValue, format: ConfigFormat) -> Result<String> {
    Ok(match format {
        ConfigFormat::Yaml => serde_yaml::to_string(tree)?,
        ConfigFormat::Json => serde_json::to_string_pretty(tree)? + "\n",
    })
}
