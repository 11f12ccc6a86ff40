//! # Project Declarations
//!
//! This module defines the data structures for the `stitch.yaml` file found
//! at the root of every project directory, and the logic for loading and
//! validating it into a [`ProjectSetting`].
//!
//! ```yaml
//! name: app
//! options:
//!   - name: release
//!     type: bool
//!     default: false
//!     assign:
//!       - project: base
//!         option: mode
//!         value: prod
//!         match: release
//! dependencies:
//!   - link: "dir:../base"
//! resources:
//!   - dir: files
//!     excludes: ["*.bak"]
//! ```
//!
//! The file may also be written as `stitch.yml`, `stitch.toml` or
//! `stitch.json`. Validation happens once, at load time: names must be valid
//! identifiers, option names and export keys must be unique within the
//! project, and defaults and choices must fit the declared option type.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::link::validate_name;
use crate::structured::{find_structured_file, load_as};
use crate::value::{OptionType, OptionValue};

/// Base name of the project declaration file.
pub const SETTING_BASE_NAME: &str = "stitch";

/// Pattern every option name must match (option names are template identifiers).
pub const OPTION_NAME_PATTERN: &str = "^[a-z_][a-z0-9_]*$";

/// Names that would shadow the keys every evaluation context provides.
pub const RESERVED_OPTION_NAMES: &[&str] = &["common", "project", "value", "options", "config"];

static OPTION_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(OPTION_NAME_PATTERN).expect("option name pattern is valid"));

/// Propagate an option's value into another project's assign bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignDeclaration {
    /// Target project, by name.
    #[serde(default)]
    pub project: Option<String>,
    /// Target project, by link (resolved to learn its name).
    #[serde(default)]
    pub link: Option<String>,
    /// Target option name.
    pub option: String,
    /// Mapping template. Without it the option's raw value passes through.
    #[serde(default)]
    pub value: Option<String>,
    /// Condition under which the assign applies.
    #[serde(default, rename = "match")]
    pub match_expr: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOptionDeclaration {
    name: String,
    #[serde(default, rename = "type")]
    ty: OptionType,
    #[serde(default)]
    export: Option<String>,
    #[serde(default)]
    default: Option<JsonValue>,
    #[serde(default)]
    choices: Vec<JsonValue>,
    #[serde(default)]
    compute: Option<String>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    assign: Vec<AssignDeclaration>,
}

/// A validated option declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDeclaration {
    pub name: String,
    pub ty: OptionType,
    /// Export key; `projectName.optionName` unless declared.
    pub export: String,
    pub default: Option<OptionValue>,
    pub choices: Vec<OptionValue>,
    pub compute: Option<String>,
    pub optional: bool,
    pub assign: Vec<AssignDeclaration>,
}

impl OptionDeclaration {
    /// A plain declaration, mostly useful for tests and programmatic setups.
    pub fn new(project: &str, name: &str, ty: OptionType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            export: format!("{}.{}", project, name),
            default: None,
            choices: Vec::new(),
            compute: None,
            optional: false,
            assign: Vec::new(),
        }
    }

    pub fn with_default(mut self, value: OptionValue) -> Self {
        self.default = Some(value);
        self
    }
}

/// A dependency edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyDeclaration {
    pub link: String,
    #[serde(default, rename = "match")]
    pub match_expr: Option<String>,
}

fn default_resource_dir() -> String {
    ".".to_string()
}

fn default_includes() -> Vec<String> {
    vec!["**/*".to_string()]
}

/// A resource scan declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDeclaration {
    /// Directory to scan, relative to the project directory.
    #[serde(default = "default_resource_dir")]
    pub dir: String,
    #[serde(default, rename = "match")]
    pub match_expr: Option<String>,
    #[serde(default = "default_includes")]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl Default for ResourceDeclaration {
    fn default() -> Self {
        Self {
            dir: default_resource_dir(),
            match_expr: None,
            includes: default_includes(),
            excludes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSetting {
    name: String,
    #[serde(default)]
    options: Vec<RawOptionDeclaration>,
    #[serde(default)]
    dependencies: Vec<DependencyDeclaration>,
    #[serde(default)]
    resources: Vec<ResourceDeclaration>,
}

/// Static declaration of one project directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSetting {
    pub name: String,
    /// Absolute project directory.
    pub dir: PathBuf,
    /// The declaration file it was loaded from.
    pub file: PathBuf,
    pub options: Vec<OptionDeclaration>,
    pub dependencies: Vec<DependencyDeclaration>,
    pub resources: Vec<ResourceDeclaration>,
}

impl ProjectSetting {
    /// Load and validate the declaration file in `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let file = find_structured_file(dir, &[SETTING_BASE_NAME])?;
        let raw: RawSetting = load_as(&file)?;
        Self::from_raw(raw, dir, file)
    }

    fn from_raw(raw: RawSetting, dir: &Path, file: PathBuf) -> Result<Self> {
        let setting_error = |message: String, hint: Option<&str>| Error::SettingParse {
            path: file.clone(),
            message,
            hint: hint.map(str::to_string),
        };

        validate_name("project", &raw.name)?;

        let mut names = HashSet::new();
        let mut exports = HashSet::new();
        let mut options = Vec::with_capacity(raw.options.len());

        for option in raw.options {
            if !OPTION_NAME_RE.is_match(&option.name) {
                return Err(Error::InvalidName {
                    kind: "option",
                    name: option.name,
                    pattern: OPTION_NAME_PATTERN,
                });
            }
            if RESERVED_OPTION_NAMES.contains(&option.name.as_str()) {
                return Err(setting_error(
                    format!("option name '{}' is reserved", option.name),
                    Some("Reserved names are: common, project, value, options, config"),
                ));
            }
            if !names.insert(option.name.clone()) {
                return Err(Error::DuplicateDeclaration {
                    kind: "option",
                    name: option.name,
                    project: raw.name,
                });
            }

            let export = option
                .export
                .clone()
                .unwrap_or_else(|| format!("{}.{}", raw.name, option.name));
            if export.is_empty() {
                return Err(setting_error(
                    format!("option '{}' has an empty export key", option.name),
                    None,
                ));
            }
            if !exports.insert(export.clone()) {
                return Err(Error::DuplicateDeclaration {
                    kind: "export",
                    name: export,
                    project: raw.name,
                });
            }

            let default = option
                .default
                .as_ref()
                .map(|value| OptionValue::from_json(value, option.ty)?.coerce(option.ty))
                .transpose()
                .map_err(|err| {
                    setting_error(
                        format!("default of option '{}': {}", option.name, err),
                        None,
                    )
                })?;

            let choices = option
                .choices
                .iter()
                .map(|value| OptionValue::from_json(value, option.ty)?.coerce(option.ty))
                .collect::<Result<Vec<_>>>()
                .map_err(|err| {
                    setting_error(
                        format!("choices of option '{}': {}", option.name, err),
                        None,
                    )
                })?;

            for assign in &option.assign {
                if assign.project.is_some() == assign.link.is_some() {
                    return Err(setting_error(
                        format!(
                            "assign on option '{}' must name exactly one of 'project' or 'link'",
                            option.name
                        ),
                        Some("Use 'project: NAME' for a loaded project or 'link: LINK' to locate it"),
                    ));
                }
                if let Some(project) = &assign.project {
                    validate_name("project", project)?;
                }
            }

            options.push(OptionDeclaration {
                name: option.name,
                ty: option.ty,
                export,
                default,
                choices,
                compute: option.compute,
                optional: option.optional,
                assign: option.assign,
            });
        }

        for resource in &raw.resources {
            if Path::new(&resource.dir).is_absolute() {
                return Err(setting_error(
                    format!("resource dir '{}' must be relative", resource.dir),
                    Some("Resource directories are relative to the project directory"),
                ));
            }
        }

        Ok(Self {
            name: raw.name,
            dir: dir.to_path_buf(),
            file,
            options,
            dependencies: raw.dependencies,
            resources: raw.resources,
        })
    }
}
