//! # Expression and Template Evaluation
//!
//! Every expression in a project declaration or profile (match conditions,
//! link templates, computed options, assign mappings) is evaluated here. The
//! implementation is backed by `tera`:
//!
//! - **Bool expressions** (`eval_bool_expr`) are tera `if` conditions, e.g.
//!   `common.os == "linux" and release`. An empty expression is true.
//! - **String templates** (`eval_string_template`) are plain tera templates,
//!   e.g. `git:https://example.com/{{ name }}.git`.
//! - **Typed expressions** (`eval_expr`) are tera expressions whose result is
//!   checked against an option type, e.g. `mode == "prod"` for a bool.
//!
//! Evaluation data lives in an [`EvalContext`]. Data is injected in layers:
//! later calls shadow earlier ones under the same top-level key.

use std::error::Error as StdError;

use log::trace;
use serde_json::{Map, Value as JsonValue};
use tera::{Context, Tera};

use crate::error::{Error, Result};
use crate::value::{OptionType, OptionValue};

/// Layered evaluation data.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    data: Map<String, JsonValue>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing whatever an earlier layer put there.
    pub fn set_data(&mut self, key: &str, value: JsonValue) -> &mut Self {
        self.data.insert(key.to_string(), value);
        self
    }

    /// Deep-merge `value` into `key`. Mappings merge recursively; anything
    /// else replaces.
    pub fn merge_data(&mut self, key: &str, value: JsonValue) -> &mut Self {
        match self.data.get_mut(key) {
            Some(existing) => merge_json(existing, value),
            None => {
                self.data.insert(key.to_string(), value);
            }
        }
        self
    }

    /// Inject every entry of `root` at the top level.
    pub fn set_root_data(&mut self, root: Map<String, JsonValue>) -> &mut Self {
        for (key, value) in root {
            self.data.insert(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.data.get(key)
    }

    pub fn to_value(&self) -> JsonValue {
        JsonValue::Object(self.data.clone())
    }

    fn to_tera(&self, source_text: &str) -> Result<Context> {
        Context::from_value(self.to_value()).map_err(|err| template_error(source_text, &err))
    }
}

fn merge_json(target: &mut JsonValue, incoming: JsonValue) {
    match (target, incoming) {
        (JsonValue::Object(target_map), JsonValue::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}

/// Flatten a tera error and its causes into one line.
pub(crate) fn template_error(source_text: &str, err: &tera::Error) -> Error {
    let mut message = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    Error::Template {
        source_text: source_text.to_string(),
        message,
    }
}

/// Tera-backed evaluator.
#[derive(Debug, Default, Clone, Copy)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a boolean condition. An empty expression is true.
    pub fn eval_bool_expr(&self, expr: &str, ctx: &EvalContext) -> Result<bool> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(true);
        }

        let template = format!("{{% if {} %}}true{{% else %}}false{{% endif %}}", expr);
        let rendered = Tera::one_off(&template, &ctx.to_tera(expr)?, false)
            .map_err(|err| template_error(expr, &err))?;
        trace!("bool expression '{}' -> {}", expr, rendered);
        Ok(rendered == "true")
    }

    /// Render a string template.
    pub fn eval_string_template(&self, template: &str, ctx: &EvalContext) -> Result<String> {
        Tera::one_off(template, &ctx.to_tera(template)?, false)
            .map_err(|err| template_error(template, &err))
    }

    /// Evaluate an expression and check the result against `ty`.
    pub fn eval_expr(&self, expr: &str, ty: OptionType, ctx: &EvalContext) -> Result<OptionValue> {
        let expr = expr.trim();
        let template = format!(
            "{{% set __stitch_value = {} %}}{{{{ __stitch_value | json_encode() }}}}",
            expr
        );
        let rendered = Tera::one_off(&template, &ctx.to_tera(expr)?, false)
            .map_err(|err| template_error(expr, &err))?;
        let value: JsonValue = serde_json::from_str(&rendered).map_err(|err| Error::Template {
            source_text: expr.to_string(),
            message: format!("expression did not produce a value: {}", err),
        })?;
        OptionValue::from_json(&value, ty)?.coerce(ty)
    }
}
