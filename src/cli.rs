//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use stitch::output::{ColorChoice, OutputConfig};

/// Stitch - Compose runnable script artifacts from a graph of projects
#[derive(Parser, Debug)]
#[command(name = "stitch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output
    #[arg(long, global = true, value_enum, value_name = "WHEN", default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    #[command(flatten)]
    profile: commands::ProfileArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compose the project graph and write the artifact
    Build(commands::build::BuildArgs),

    /// Display the project dependency graph
    Tree(commands::tree::TreeArgs),

    /// Print the merged config or its trace
    Config(commands::config::ConfigArgs),

    /// Print every resolved option with its source
    Options(commands::options::OptionsArgs),

    /// Build into a temporary directory and run a target with an executor
    Run(commands::run::RunArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<i32> {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.log_level.as_str()),
        )
        .format_timestamp(None)
        .try_init();

        let output = OutputConfig::new(self.color);
        output.apply();

        match self.command {
            Commands::Build(args) => commands::build::execute(args, &self.profile, &output).map(|_| 0),
            Commands::Tree(args) => commands::tree::execute(args, &self.profile, &output).map(|_| 0),
            Commands::Config(args) => commands::config::execute(args, &self.profile).map(|_| 0),
            Commands::Options(args) => commands::options::execute(args, &self.profile, &output).map(|_| 0),
            Commands::Run(args) => commands::run::execute(args, &self.profile),
            Commands::Completions(args) => commands::completions::execute(args).map(|_| 0),
        }
    }
}
