//! # CLI Command Implementations
//!
//! Each subcommand of `stitch` lives in its own file with:
//! - An `Args` struct that defines the command-specific arguments, derived
//!   using `clap`.
//! - An `execute` function that takes the parsed `Args` (plus the shared
//!   profile arguments) and calls into the `stitch` library.
//!
//! Every command except `completions` starts by assembling a [`Profile`]
//! from the profile file and the command-line overrides in [`ProfileArgs`].

pub mod build;
pub mod completions;
pub mod config;
pub mod options;
pub mod run;
pub mod tree;

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::debug;

use stitch::defaults::DEFAULT_PROFILE_FILE;
use stitch::profile::{Profile, ProfileOverrides};

/// Options selecting and adjusting the profile of a run.
#[derive(Args, Debug, Clone, Default)]
pub struct ProfileArgs {
    /// Profile file (defaults to ./stitch-profile.yaml when present)
    #[arg(long, global = true, value_name = "FILE", env = "STITCH_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Main project link, replacing the profile's
    #[arg(long, global = true, value_name = "LINK")]
    pub project: Option<String>,

    /// Additional project link (repeatable)
    #[arg(long = "addition", global = true, value_name = "LINK")]
    pub additions: Vec<String>,

    /// Assign an option value (repeatable)
    #[arg(long, global = true, value_name = "PROJECT.OPTION=VALUE")]
    pub set: Vec<String>,

    /// Override or add a common fact (repeatable)
    #[arg(long, global = true, value_name = "KEY=VALUE")]
    pub common: Vec<String>,

    /// Root directory for git checkouts
    ///
    /// Defaults to the system cache directory (e.g. `~/.cache/stitch` on
    /// Linux).
    #[arg(long, global = true, value_name = "DIR", env = "STITCH_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Never download; use existing checkouts only
    #[arg(long, global = true)]
    pub offline: bool,
}

impl ProfileArgs {
    /// Load the profile and apply the command-line overrides.
    pub fn load(&self) -> Result<Profile> {
        let cwd = std::env::current_dir()?;
        let mut profile = Profile::load_or_default(
            self.profile.as_deref(),
            &cwd.join(DEFAULT_PROFILE_FILE),
            &cwd,
        )?;

        let overrides = ProfileOverrides {
            project: self.project.clone(),
            additions: self.additions.clone(),
            set: self.set.clone(),
            common: self.common.clone(),
            workspace: self.workspace.clone(),
            offline: self.offline,
        };
        overrides.apply(&mut profile, &cwd)?;
        debug!("profile rooted at {}", profile.base_dir.display());
        Ok(profile)
    }
}
