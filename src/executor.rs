//! Executor selection and launch.
//!
//! An executor says how to run a materialized target: which binary, which
//! file extensions it handles, and how its argument list is built. Argument
//! entries are templates rendered with `file` (the target path) and `args`
//! (the extra command-line arguments as an array); the extra arguments are
//! then appended verbatim.

use std::path::Path;
use std::process::Command;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::evaluator::{EvalContext, Evaluator};

fn default_args() -> Vec<String> {
    vec!["{{ file }}".to_string()]
}

/// How to launch one kind of target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorDefinition {
    pub name: String,
    pub bin: String,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

impl ExecutorDefinition {
    pub fn new(name: &str, bin: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            bin: bin.to_string(),
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
            args: default_args(),
        }
    }

    /// Whether this executor can run `target` (matched by extension).
    pub fn handles(&self, target: &str) -> bool {
        self.extensions.iter().any(|ext| target.ends_with(ext.as_str()))
    }

    /// Render the full argument list for `file`.
    pub fn render_args(&self, file: &Path, extra: &[String]) -> Result<Vec<String>> {
        let mut ctx = EvalContext::new();
        ctx.set_data("file", json!(file.to_string_lossy()))
            .set_data("args", json!(extra));

        let evaluator = Evaluator::new();
        let mut rendered = self
            .args
            .iter()
            .map(|arg| evaluator.eval_string_template(arg, &ctx))
            .collect::<Result<Vec<_>>>()
            .map_err(|err| Error::Executor {
                executor: self.name.clone(),
                message: err.to_string(),
            })?;
        rendered.extend(extra.iter().cloned());
        Ok(rendered)
    }

    /// Run `file` and return its exit code.
    pub fn run(&self, file: &Path, extra: &[String], cwd: &Path) -> Result<i32> {
        let args = self.render_args(file, extra)?;
        info!("running {} {}", self.bin, args.join(" "));

        let status = Command::new(&self.bin)
            .args(&args)
            .current_dir(cwd)
            .status()
            .map_err(|err| Error::Executor {
                executor: self.name.clone(),
                message: format!("failed to launch '{}': {}", self.bin, err),
            })?;

        debug!("{} exited with {}", self.bin, status);
        // Killed by a signal: report a generic failure
        Ok(status.code().unwrap_or(1))
    }
}

/// Executors known to this run: built-ins plus profile definitions.
#[derive(Debug, Clone)]
pub struct ExecutorRegistry {
    definitions: Vec<ExecutorDefinition>,
}

impl ExecutorRegistry {
    /// Built-ins, with profile definitions replacing same-named ones.
    pub fn new(custom: &[ExecutorDefinition]) -> Self {
        let mut definitions = vec![
            ExecutorDefinition::new("bash", "bash", &[".sh", ".bash"]),
            ExecutorDefinition::new("sh", "sh", &[".sh"]),
        ];
        for definition in custom {
            match definitions.iter_mut().find(|d| d.name == definition.name) {
                Some(existing) => *existing = definition.clone(),
                None => definitions.push(definition.clone()),
            }
        }
        Self { definitions }
    }

    pub fn get(&self, name: &str) -> Result<&ExecutorDefinition> {
        self.definitions
            .iter()
            .find(|definition| definition.name == name)
            .ok_or_else(|| Error::Executor {
                executor: name.to_string(),
                message: format!(
                    "unknown executor; known executors: {}",
                    self.definitions
                        .iter()
                        .map(|d| d.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.name.as_str()).collect()
    }
}

/// Pick the target to run: the first one under `project/` the executor handles.
pub fn select_target<'a>(
    targets: &'a [String],
    project: &str,
    executor: &ExecutorDefinition,
) -> Option<&'a str> {
    let prefix = format!("{}/", project);
    targets
        .iter()
        .map(String::as_str)
        .find(|target| target.starts_with(&prefix) && executor.handles(target))
}
