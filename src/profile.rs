//! # Profiles
//!
//! A profile is the run-level settings file. It names the main project and
//! any addition projects, and carries the registry rules, redirect rules,
//! pre-seeded assigns and exports, common-fact overrides and executor
//! definitions for one composition.
//!
//! Profiles are loaded from `stitch-profile.yaml` (or any file passed with
//! `--profile`) and then adjusted by command-line flags through
//! [`ProfileOverrides`]. Relative `dir:` links and a relative workspace are
//! resolved against the directory holding the profile file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults::default_workspace;
use crate::error::{Error, Result};
use crate::executor::ExecutorDefinition;
use crate::link::ProjectLink;
use crate::structured::load_as;

/// Maps a registry name to a concrete link template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryRule {
    pub name: String,
    /// Template rendered with `name`, `path`, `ref`, `refType`, `refName`.
    pub link: String,
    #[serde(default, rename = "match")]
    pub match_expr: Option<String>,
}

/// Rewrites a resolved link matching `regex` into another link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedirectRule {
    pub regex: String,
    /// Template rendered with the capture groups and the matched `link`.
    pub link: String,
    #[serde(default, rename = "match")]
    pub match_expr: Option<String>,
}

/// Run-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    /// Main project link.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub additions: Vec<String>,
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub registries: Vec<RegistryRule>,
    #[serde(default)]
    pub redirects: Vec<RedirectRule>,
    /// Pre-seeded assigns: project name → option name → value.
    #[serde(default)]
    pub assign: BTreeMap<String, BTreeMap<String, JsonValue>>,
    /// Pre-seeded exports by export key.
    #[serde(default)]
    pub exports: BTreeMap<String, JsonValue>,
    /// Common-fact overrides and extra common data.
    #[serde(default)]
    pub common: BTreeMap<String, JsonValue>,
    #[serde(default)]
    pub executors: Vec<ExecutorDefinition>,
    /// Directory relative links and paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Profile {
    /// An empty profile rooted at `base_dir`.
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            ..Self::default()
        }
    }

    /// Load a profile file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut profile: Profile = load_as(path)?;
        let base_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        profile.base_dir = std::path::absolute(&base_dir)?;
        debug!("loaded profile {}", path.display());
        Ok(profile)
    }

    /// Load `path` when given; otherwise load `default_path` if it exists, or
    /// start from an empty profile rooted at `cwd`.
    pub fn load_or_default(path: Option<&Path>, default_path: &Path, cwd: &Path) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if default_path.is_file() => Self::load(default_path),
            None => Ok(Self::new(cwd)),
        }
    }

    /// The main project link, parsed relative to the profile directory.
    pub fn main_link(&self) -> Result<ProjectLink> {
        let raw = self.project.as_deref().ok_or_else(|| Error::SettingParse {
            path: self.base_dir.clone(),
            message: "no main project given".to_string(),
            hint: Some("Set 'project:' in the profile or pass --project LINK".to_string()),
        })?;
        ProjectLink::parse_in(raw, Some(&self.base_dir))
    }

    pub fn addition_links(&self) -> Result<Vec<ProjectLink>> {
        self.additions
            .iter()
            .map(|raw| ProjectLink::parse_in(raw, Some(&self.base_dir)))
            .collect()
    }

    /// Root directory for git checkouts.
    pub fn workspace(&self) -> PathBuf {
        match &self.workspace {
            Some(workspace) if workspace.is_absolute() => workspace.clone(),
            Some(workspace) => self.base_dir.join(workspace),
            None => default_workspace(),
        }
    }
}

/// Command-line adjustments applied on top of a loaded profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileOverrides {
    pub project: Option<String>,
    pub additions: Vec<String>,
    /// `project.option=value` entries.
    pub set: Vec<String>,
    /// `key=value` entries.
    pub common: Vec<String>,
    pub workspace: Option<PathBuf>,
    pub offline: bool,
}

impl ProfileOverrides {
    /// Apply the overrides. Links given on the command line are relative to
    /// `cwd`, so they are made absolute here.
    pub fn apply(&self, profile: &mut Profile, cwd: &Path) -> Result<()> {
        if let Some(project) = &self.project {
            profile.project = Some(absolute_dir_link(project, cwd));
        }
        profile
            .additions
            .extend(self.additions.iter().map(|raw| absolute_dir_link(raw, cwd)));

        for entry in &self.set {
            let (key, value) = split_pair("--set", entry)?;
            let (project, option) = key.split_once('.').ok_or_else(|| Error::InvalidOverride {
                flag: "--set",
                value: entry.clone(),
                message: "expected PROJECT.OPTION=VALUE".to_string(),
            })?;
            profile
                .assign
                .entry(project.to_string())
                .or_default()
                .insert(option.to_string(), JsonValue::String(value.to_string()));
        }

        for entry in &self.common {
            let (key, value) = split_pair("--common", entry)?;
            profile
                .common
                .insert(key.to_string(), JsonValue::String(value.to_string()));
        }

        if let Some(workspace) = &self.workspace {
            profile.workspace = Some(cwd.join(workspace));
        }
        if self.offline {
            profile.offline = true;
        }
        Ok(())
    }
}

fn split_pair<'a>(flag: &'static str, entry: &'a str) -> Result<(&'a str, &'a str)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(Error::InvalidOverride {
            flag,
            value: entry.to_string(),
            message: "expected KEY=VALUE".to_string(),
        }),
    }
}

fn absolute_dir_link(raw: &str, cwd: &Path) -> String {
    match raw.strip_prefix("dir:") {
        Some(path) if !Path::new(path).is_absolute() => {
            format!("dir:{}", cwd.join(path).display())
        }
        _ => raw.to_string(),
    }
}
