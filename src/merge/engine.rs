//! Fragment merging with provenance tracking
//!
//! Fragments are applied one at a time onto a shared value tree. A second
//! tree, the trace, mirrors the value's shape and holds the path of the
//! fragment file that last wrote each leaf.
//!
//! A `$merge` mode stays in force after its fragment is applied: fragments
//! of lower order that reach the same key later merge under the mode the
//! higher fragment declared. `replace` keeps the higher value and drops
//! lower contributions; `insert` keeps the higher items ahead and appends
//! lower items after them, whatever mode the lower fragment asks for.

use std::collections::BTreeMap;

use log::{debug, trace};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::fragment::{ConfigFragment, FragmentData, MergeMode};
use crate::error::{Error, Result};
use crate::project::Project;

/// Result of merging every fragment of a project set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedConfig {
    pub value: JsonValue,
    pub trace: JsonValue,
}

impl Default for MergedConfig {
    fn default() -> Self {
        Self {
            value: JsonValue::Object(Map::new()),
            trace: JsonValue::Object(Map::new()),
        }
    }
}

/// Modes declared by already applied fragments, by key path.
type Locks = BTreeMap<Vec<String>, MergeMode>;

/// Merge the config fragments of `projects`, given in load order.
pub fn merge_all(projects: &[&Project]) -> Result<MergedConfig> {
    let fragments: Vec<&ConfigFragment> = projects
        .iter()
        .flat_map(|project| project.resource.configs.iter())
        .collect();
    merge_fragments(&fragments)
}

/// Merge fragments given in discovery order.
///
/// Fragments are stable-sorted by `$order` descending and applied in that
/// sequence.
pub fn merge_fragments(fragments: &[&ConfigFragment]) -> Result<MergedConfig> {
    let mut ordered = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        ordered.push((fragment.order()?, *fragment));
    }
    ordered.sort_by(|a, b| b.0.cmp(&a.0));

    let mut merged = MergedConfig::default();
    let mut locks = Locks::new();
    for (order, fragment) in ordered {
        debug!("merging {} (order {})", fragment.path().display(), order);
        let file = fragment.path().display().to_string();
        let data = fragment.data()?;
        apply_fragment(&mut merged, &locks, data, &file)?;

        for (path, mode) in &data.overrides {
            if writes_path(&data.value, path) {
                locks.entry(path.clone()).or_insert(*mode);
            }
        }
    }
    Ok(merged)
}

/// Whether `value` holds an entry at `path`.
fn writes_path(value: &Map<String, JsonValue>, path: &[String]) -> bool {
    let Some((first, rest)) = path.split_first() else {
        return false;
    };
    match (value.get(first), rest.is_empty()) {
        (Some(_), true) => true,
        (Some(JsonValue::Object(inner)), false) => writes_path(inner, rest),
        _ => false,
    }
}

/// Apply one fragment's content onto the accumulated trees.
fn apply_fragment(merged: &mut MergedConfig, locks: &Locks, data: &FragmentData, file: &str) -> Result<()> {
    let mut path = Vec::new();
    let value_map = object_mut(&mut merged.value);
    let trace_map = object_mut(&mut merged.trace);
    let merge = FragmentMerge { locks, data, file };
    merge.maps(value_map, trace_map, &data.value, &mut path)
}

struct FragmentMerge<'a> {
    locks: &'a Locks,
    data: &'a FragmentData,
    file: &'a str,
}

impl FragmentMerge<'_> {
    fn maps(
        &self,
        target: &mut Map<String, JsonValue>,
        trace: &mut Map<String, JsonValue>,
        incoming: &Map<String, JsonValue>,
        path: &mut Vec<String>,
    ) -> Result<()> {
        for (key, value) in incoming {
            path.push(key.clone());
            let locked = self.locks.get(path.as_slice()).copied();
            match target.get_mut(key) {
                Some(_) if locked == Some(MergeMode::Replace) => {
                    trace!("{}: '{}' is replaced higher up, skipping", self.file, path.join("."));
                }
                Some(existing) => {
                    let key_trace = trace.entry(key.clone()).or_insert(JsonValue::Null);
                    self.entry(existing, key_trace, value, path, locked)?;
                }
                None => {
                    target.insert(key.clone(), value.clone());
                    trace.insert(key.clone(), mirror(value, self.file));
                }
            }
            path.pop();
        }
        Ok(())
    }

    fn entry(
        &self,
        target: &mut JsonValue,
        trace: &mut JsonValue,
        incoming: &JsonValue,
        path: &mut Vec<String>,
        locked: Option<MergeMode>,
    ) -> Result<()> {
        // An insert declared higher up pins the existing items in front
        let mode = match locked {
            Some(MergeMode::Insert) => MergeMode::Append,
            _ => self
                .data
                .overrides
                .get(path.as_slice())
                .copied()
                .unwrap_or(MergeMode::Append),
        };

        let overwrite = match (&*target, incoming) {
            (JsonValue::Object(_), JsonValue::Object(_)) | (JsonValue::Array(_), JsonValue::Array(_)) => {
                mode == MergeMode::Replace
            }
            (JsonValue::Null, _) | (_, JsonValue::Null) => true,
            (JsonValue::Object(_) | JsonValue::Array(_), _)
            | (_, JsonValue::Object(_) | JsonValue::Array(_)) => {
                return Err(Error::MergeType {
                    file: self.file.to_string(),
                    key: path.join("."),
                    message: format!(
                        "cannot merge a {} into a {}",
                        type_name(incoming),
                        type_name(target)
                    ),
                });
            }
            _ => true,
        };

        if overwrite {
            trace!("{}: overwriting '{}'", self.file, path.join("."));
            *target = incoming.clone();
            *trace = mirror(incoming, self.file);
            return Ok(());
        }

        match (target, incoming) {
            (JsonValue::Object(target_map), JsonValue::Object(incoming_map)) => {
                self.maps(target_map, object_mut(trace), incoming_map, path)
            }
            (JsonValue::Array(target_items), JsonValue::Array(incoming_items)) => {
                // Items applied earlier come from higher orders and stay ahead
                target_items.extend(incoming_items.iter().cloned());
                array_mut(trace).extend(incoming_items.iter().map(|item| mirror(item, self.file)));
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A tree of the same shape as `value` with `file` at every leaf.
fn mirror(value: &JsonValue, file: &str) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), mirror(value, file)))
                .collect(),
        ),
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(|item| mirror(item, file)).collect())
        }
        _ => JsonValue::String(file.to_string()),
    }
}

fn object_mut(value: &mut JsonValue) -> &mut Map<String, JsonValue> {
    if !value.is_object() {
        *value = JsonValue::Object(Map::new());
    }
    match value {
        JsonValue::Object(map) => map,
        _ => unreachable!("value was just made a mapping"),
    }
}

fn array_mut(value: &mut JsonValue) -> &mut Vec<JsonValue> {
    if !value.is_array() {
        *value = JsonValue::Array(Vec::new());
    }
    match value {
        JsonValue::Array(items) => items,
        _ => unreachable!("value was just made a sequence"),
    }
}

/// Get a human-readable type name for a value
pub fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "sequence",
        JsonValue::Object(_) => "mapping",
    }
}
