//! # Option Resolution
//!
//! Every declared option of every loaded project resolves to exactly one
//! value. Candidate values come from four places:
//!
//! - **export**: the application-wide bucket keyed by export name. Profiles
//!   seed it, and every option that resolves from another source is
//!   published into it for projects loaded later.
//! - **assign**: per-project-per-option raw strings. Profiles seed them and
//!   projects propagate them to other projects through `assign` entries on
//!   their option declarations.
//! - **compute**: an expression over the project's already-resolved options.
//! - **default**: the declared default.
//!
//! Export, assign and compute must agree when more than one is present;
//! otherwise precedence is `export > assign > compute > default`. Every
//! outcome is recorded once in the result registry.
//!
//! All registries live in [`ApplicationOption`], an explicit context object
//! owned by the loader for one composition run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use log::{debug, trace};
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};

use crate::error::{Error, ErrorContext, Result, ResultExt};
use crate::evaluator::{EvalContext, Evaluator};
use crate::profile::Profile;
use crate::setting::{AssignDeclaration, OptionDeclaration, ProjectSetting};
use crate::value::OptionValue;

/// Where a resolved option value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSource {
    Unset,
    Export,
    Assign,
    Compute,
    Default,
}

impl OptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionSource::Unset => "unset",
            OptionSource::Export => "export",
            OptionSource::Assign => "assign",
            OptionSource::Compute => "compute",
            OptionSource::Default => "default",
        }
    }
}

impl fmt::Display for OptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved option. `value` is `None` only for `Unset`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionResultItem {
    pub value: Option<OptionValue>,
    pub source: OptionSource,
}

impl OptionResultItem {
    pub fn new(value: OptionValue, source: OptionSource) -> Self {
        Self {
            value: Some(value),
            source,
        }
    }

    pub fn unset() -> Self {
        Self {
            value: None,
            source: OptionSource::Unset,
        }
    }
}

/// Host facts every evaluation context sees under `common`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonFacts {
    pub os: String,
    pub arch: String,
    pub executor: String,
    pub hostname: String,
    pub username: String,
    /// Additional keys supplied by the profile.
    pub extra: BTreeMap<String, JsonValue>,
}

impl CommonFacts {
    /// Detect facts from the running host.
    pub fn detect() -> Self {
        let executor = std::env::var("SHELL")
            .ok()
            .and_then(|shell| {
                Path::new(&shell)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .filter(|name| name == "bash" || name == "sh")
            .unwrap_or_else(|| "bash".to_string());

        let hostname = std::env::var("HOSTNAME")
            .ok()
            .filter(|name| !name.is_empty())
            .or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
            })
            .unwrap_or_else(|| "localhost".to_string());

        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            executor,
            hostname,
            username,
            extra: BTreeMap::new(),
        }
    }

    /// Apply profile overrides. Reserved keys replace the detected fact;
    /// anything else is carried as extra data.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, JsonValue>) -> Self {
        for (key, value) in overrides {
            let text = match value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            match key.as_str() {
                "os" => self.os = text,
                "arch" => self.arch = text,
                "executor" => self.executor = text,
                "hostname" => self.hostname = text,
                "username" => self.username = text,
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
        self
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map: Map<String, JsonValue> = self
            .extra
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        map.insert("os".to_string(), json!(self.os));
        map.insert("arch".to_string(), json!(self.arch));
        map.insert("executor".to_string(), json!(self.executor));
        map.insert("hostname".to_string(), json!(self.hostname));
        map.insert("username".to_string(), json!(self.username));
        JsonValue::Object(map)
    }
}

#[derive(Debug, Clone)]
struct ExportEntry {
    value: OptionValue,
    origin: String,
}

#[derive(Debug, Clone)]
struct AssignEntry {
    raw: String,
    origin: String,
}

/// The resolved options of one project, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectOptions {
    pub project: String,
    pub items: Vec<(String, OptionResultItem)>,
}

impl ProjectOptions {
    pub fn get(&self, name: &str) -> Option<&OptionResultItem> {
        self.items
            .iter()
            .find(|(option, _)| option == name)
            .map(|(_, item)| item)
    }

    /// Option values keyed by name; unset options are left out so they stay
    /// undefined (and falsy) in expressions.
    pub fn to_context_map(&self) -> Map<String, JsonValue> {
        self.items
            .iter()
            .filter_map(|(name, item)| item.value.as_ref().map(|value| (name.clone(), value.to_json())))
            .collect()
    }
}

/// Application-wide option registries for one composition run.
#[derive(Debug, Clone)]
pub struct ApplicationOption {
    common: CommonFacts,
    export: BTreeMap<String, ExportEntry>,
    assign: BTreeMap<(String, String), AssignEntry>,
    result: BTreeMap<(String, String), OptionResultItem>,
    result_order: Vec<(String, String)>,
    evaluator: Evaluator,
}

impl ApplicationOption {
    pub fn new(common: CommonFacts) -> Self {
        Self {
            common,
            export: BTreeMap::new(),
            assign: BTreeMap::new(),
            result: BTreeMap::new(),
            result_order: Vec::new(),
            evaluator: Evaluator::new(),
        }
    }

    /// Registries seeded from a profile's `common`, `exports` and `assign`.
    pub fn from_profile(profile: &Profile) -> Result<Self> {
        let common = CommonFacts::detect().with_overrides(&profile.common);
        let mut app = Self::new(common);

        for (key, value) in &profile.exports {
            let value = OptionValue::infer(value)
                .with_context(|| ErrorContext::new().with("export", key))?;
            app.export.insert(
                key.clone(),
                ExportEntry {
                    value,
                    origin: "profile".to_string(),
                },
            );
        }

        for (project, options) in &profile.assign {
            for (option, value) in options {
                let raw = match value {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                };
                app.insert_assign(project, option, raw, "profile")?;
            }
        }

        Ok(app)
    }

    pub fn common(&self) -> &CommonFacts {
        &self.common
    }

    /// Context every expression starts from.
    pub fn base_context(&self) -> EvalContext {
        let mut ctx = EvalContext::new();
        ctx.set_data("common", self.common.to_json());
        ctx
    }

    pub fn get_export(&self, key: &str) -> Option<&OptionValue> {
        self.export.get(key).map(|entry| &entry.value)
    }

    pub fn get_assign(&self, project: &str, option: &str) -> Option<&str> {
        self.assign
            .get(&(project.to_string(), option.to_string()))
            .map(|entry| entry.raw.as_str())
    }

    /// Seed an assign. A second assign to the same target is an error.
    pub fn insert_assign(
        &mut self,
        project: &str,
        option: &str,
        raw: String,
        origin: &str,
    ) -> Result<()> {
        let key = (project.to_string(), option.to_string());
        if let Some(existing) = self.assign.get(&key) {
            return Err(Error::DuplicateAssign {
                project: project.to_string(),
                option: option.to_string(),
                first: existing.origin.clone(),
                second: origin.to_string(),
            });
        }
        debug!("assign {}.{} = {:?} (from {})", project, option, raw, origin);
        self.assign.insert(
            key,
            AssignEntry {
                raw,
                origin: origin.to_string(),
            },
        );
        Ok(())
    }

    pub fn result(&self, project: &str, option: &str) -> Option<&OptionResultItem> {
        self.result.get(&(project.to_string(), option.to_string()))
    }

    /// Every recorded result, in resolution order.
    pub fn results(&self) -> impl Iterator<Item = (&str, &str, &OptionResultItem)> {
        self.result_order.iter().filter_map(|key| {
            self.result
                .get(key)
                .map(|item| (key.0.as_str(), key.1.as_str(), item))
        })
    }

    /// Export keys and values, sorted by key.
    pub fn exports(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.export
            .iter()
            .map(|(key, entry)| (key.as_str(), &entry.value))
    }

    fn record_result(&mut self, project: &str, option: &str, item: OptionResultItem) -> Result<()> {
        let key = (project.to_string(), option.to_string());
        if self.result.contains_key(&key) {
            return Err(Error::DuplicateResult {
                project: project.to_string(),
                option: option.to_string(),
            });
        }
        self.result_order.push(key.clone());
        self.result.insert(key, item);
        Ok(())
    }

    /// Resolve one option and record the outcome.
    ///
    /// `resolved` holds the values of the options declared earlier in the
    /// same project; it is the context a `compute` expression sees.
    pub fn find_result(
        &mut self,
        project: &str,
        project_dir: &Path,
        declaration: &OptionDeclaration,
        resolved: &Map<String, JsonValue>,
    ) -> Result<OptionResultItem> {
        let export_value = self.export_candidate(project, declaration)?;
        let assign_value = self.assign_candidate(project, declaration)?;
        let compute_value = match &declaration.compute {
            Some(expr) => {
                let mut ctx = self.base_context();
                ctx.set_data("project", json!({"name": project, "dir": project_dir}))
                    .set_root_data(resolved.clone());
                let value = self.evaluator.eval_expr(expr, declaration.ty, &ctx)?;
                Some(value)
            }
            None => None,
        };

        let present: Vec<(OptionSource, &OptionValue)> = [
            (OptionSource::Export, export_value.as_ref()),
            (OptionSource::Assign, assign_value.as_ref()),
            (OptionSource::Compute, compute_value.as_ref()),
        ]
        .into_iter()
        .filter_map(|(source, value)| value.map(|value| (source, value)))
        .collect();

        for (i, (first_source, first_value)) in present.iter().enumerate() {
            check_choices(project, declaration, first_value)?;
            for (second_source, second_value) in &present[i + 1..] {
                if first_value != second_value {
                    return Err(Error::OptionConflict {
                        project: project.to_string(),
                        option: declaration.name.clone(),
                        first_source: first_source.to_string(),
                        first_value: first_value.to_string(),
                        second_source: second_source.to_string(),
                        second_value: second_value.to_string(),
                    });
                }
            }
        }

        let item = match present.first() {
            Some((source, value)) => OptionResultItem::new((*value).clone(), *source),
            None => match &declaration.default {
                Some(value) => {
                    check_choices(project, declaration, value)?;
                    OptionResultItem::new(value.clone(), OptionSource::Default)
                }
                None if declaration.optional => OptionResultItem::unset(),
                None => {
                    return Err(Error::OptionEmpty {
                        project: project.to_string(),
                        option: declaration.name.clone(),
                    })
                }
            },
        };

        trace!(
            "{}.{} = {:?} ({})",
            project, declaration.name, item.value, item.source
        );
        self.record_result(project, &declaration.name, item.clone())?;

        if item.source != OptionSource::Export
            && let Some(value) = &item.value
        {
            self.export
                .entry(declaration.export.clone())
                .or_insert_with(|| ExportEntry {
                    value: value.clone(),
                    origin: format!("{}.{}", project, declaration.name),
                });
        }

        Ok(item)
    }

    fn export_candidate(
        &self,
        project: &str,
        declaration: &OptionDeclaration,
    ) -> Result<Option<OptionValue>> {
        let Some(entry) = self.export.get(&declaration.export) else {
            return Ok(None);
        };
        if !entry.value.fits(declaration.ty) {
            return Err(Error::ExportTypeConflict {
                key: declaration.export.clone(),
                project: project.to_string(),
                option: declaration.name.clone(),
                expected: declaration.ty.to_string(),
                actual: format!("{} (from {})", entry.value.option_type(), entry.origin),
            });
        }
        entry.value.clone().coerce(declaration.ty).map(Some)
    }

    fn assign_candidate(
        &self,
        project: &str,
        declaration: &OptionDeclaration,
    ) -> Result<Option<OptionValue>> {
        let key = (project.to_string(), declaration.name.clone());
        let Some(entry) = self.assign.get(&key) else {
            return Ok(None);
        };
        let value = OptionValue::parse(&entry.raw, declaration.ty).with_context(|| {
            ErrorContext::new()
                .with("assign", format!("{}.{}", project, declaration.name))
                .with("from", &entry.origin)
        })?;
        Ok(Some(value))
    }

    /// Resolve every option of `setting` in declaration order and propagate
    /// its assign entries.
    ///
    /// `locate` maps an assign's `link` to the target project's name.
    pub fn resolve_project(
        &mut self,
        setting: &ProjectSetting,
        locate: &mut dyn FnMut(&str) -> Result<String>,
    ) -> Result<ProjectOptions> {
        let mut options = ProjectOptions {
            project: setting.name.clone(),
            items: Vec::with_capacity(setting.options.len()),
        };
        let mut resolved = Map::new();

        for declaration in &setting.options {
            let item = self
                .find_result(&setting.name, &setting.dir, declaration, &resolved)
                .with_context(|| {
                    ErrorContext::new()
                        .with("project", &setting.name)
                        .with("option", &declaration.name)
                })?;
            if let Some(value) = &item.value {
                resolved.insert(declaration.name.clone(), value.to_json());
            }

            for assign in &declaration.assign {
                self.propagate(setting, declaration, &item, assign, &resolved, locate)
                    .with_context(|| {
                        ErrorContext::new()
                            .with("project", &setting.name)
                            .with("option", &declaration.name)
                            .with("assign", &assign.option)
                    })?;
            }

            options.items.push((declaration.name.clone(), item));
        }

        Ok(options)
    }

    fn propagate(
        &mut self,
        setting: &ProjectSetting,
        declaration: &OptionDeclaration,
        item: &OptionResultItem,
        assign: &AssignDeclaration,
        resolved: &Map<String, JsonValue>,
        locate: &mut dyn FnMut(&str) -> Result<String>,
    ) -> Result<()> {
        let mut ctx = self.base_context();
        ctx.set_data("project", json!({"name": setting.name, "dir": setting.dir}))
            .set_root_data(resolved.clone())
            .set_data(
                "value",
                item.value.as_ref().map(OptionValue::to_json).unwrap_or(JsonValue::Null),
            );

        if !self
            .evaluator
            .eval_bool_expr(assign.match_expr.as_deref().unwrap_or(""), &ctx)?
        {
            return Ok(());
        }

        let raw = match (&assign.value, &item.value) {
            (Some(template), _) => self.evaluator.eval_string_template(template, &ctx)?,
            (None, Some(value)) => value.to_raw_string(),
            // Nothing to pass through
            (None, None) => return Ok(()),
        };

        let target = match (&assign.project, &assign.link) {
            (Some(project), _) => project.clone(),
            (None, Some(link)) => locate(link)?,
            (None, None) => {
                return Err(Error::SettingParse {
                    path: setting.file.clone(),
                    message: format!("assign on option '{}' has no target", declaration.name),
                    hint: None,
                })
            }
        };

        let origin = format!("{}.{}", setting.name, declaration.name);
        self.insert_assign(&target, &assign.option, raw, &origin)
    }
}

fn check_choices(project: &str, declaration: &OptionDeclaration, value: &OptionValue) -> Result<()> {
    if declaration.choices.is_empty() || declaration.choices.contains(value) {
        return Ok(());
    }
    Err(Error::InvalidChoice {
        project: project.to_string(),
        option: declaration.name.clone(),
        value: value.to_string(),
        choices: declaration
            .choices
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    })
}
