//! Structured-config fragments and their merge metadata.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde_json::{Map, Value as JsonValue};

use super::parse_key_path;
use crate::error::{Error, Result};
use crate::structured::load_structured_file;

/// Reserved key holding the fragment's priority.
pub const ORDER_KEY: &str = "$order";

/// Reserved key holding per-key merge modes.
pub const MERGE_KEY: &str = "$merge";

/// How a fragment's value at a key combines with other fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Deep-merge mappings, append sequences.
    Append,
    /// Take this fragment's value over what is there, and keep lower
    /// orders out of the key.
    Replace,
    /// Keep this fragment's sequence items ahead of lower orders.
    Insert,
}

impl MergeMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "append" => Some(MergeMode::Append),
            "replace" => Some(MergeMode::Replace),
            "insert" => Some(MergeMode::Insert),
            _ => None,
        }
    }
}

/// Parsed fragment content.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentData {
    pub value: Map<String, JsonValue>,
    pub order: i64,
    /// Merge modes by key path.
    pub overrides: BTreeMap<Vec<String>, MergeMode>,
}

impl FragmentData {
    /// Split reserved keys off a parsed top-level tree.
    pub fn from_value(path: &Path, value: JsonValue) -> Result<Self> {
        let parse_error = |message: String| Error::StructuredParse {
            path: path.to_path_buf(),
            message,
        };

        let JsonValue::Object(mut map) = value else {
            return Err(parse_error("config fragment top level must be a mapping".to_string()));
        };

        let order = match map.remove(ORDER_KEY) {
            None => 0,
            Some(JsonValue::Number(n)) => n
                .as_i64()
                .ok_or_else(|| parse_error(format!("{} must be an integer, got {}", ORDER_KEY, n)))?,
            Some(other) => {
                return Err(parse_error(format!(
                    "{} must be an integer, got {}",
                    ORDER_KEY, other
                )))
            }
        };

        let mut overrides = BTreeMap::new();
        match map.remove(MERGE_KEY) {
            None => {}
            Some(JsonValue::Object(modes)) => {
                for (key, mode) in modes {
                    let mode = mode.as_str().and_then(MergeMode::parse).ok_or_else(|| {
                        parse_error(format!(
                            "{} mode for '{}' must be one of replace, insert, append",
                            MERGE_KEY, key
                        ))
                    })?;
                    overrides.insert(key_path(path, &key)?, mode);
                }
            }
            Some(other) => {
                return Err(parse_error(format!(
                    "{} must be a mapping of key to mode, got {}",
                    MERGE_KEY, other
                )))
            }
        }

        Ok(Self {
            value: map,
            order,
            overrides,
        })
    }
}

fn key_path(path: &Path, key: &str) -> Result<Vec<String>> {
    parse_key_path(key).map_err(|message| Error::StructuredParse {
        path: path.to_path_buf(),
        message: format!("invalid {} key: {}", MERGE_KEY, message),
    })
}

/// One structured-config file, parsed on first use.
#[derive(Debug, Clone)]
pub struct ConfigFragment {
    path: PathBuf,
    data: OnceCell<FragmentData>,
}

impl ConfigFragment {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: OnceCell::new(),
        }
    }

    /// A fragment with already-parsed content.
    pub fn from_data(path: PathBuf, data: FragmentData) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(data);
        Self { path, data: cell }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed content, loading the file the first time.
    pub fn data(&self) -> Result<&FragmentData> {
        if let Some(data) = self.data.get() {
            return Ok(data);
        }
        debug!("loading config fragment {}", self.path.display());
        let data = FragmentData::from_value(&self.path, load_structured_file(&self.path)?)?;
        Ok(self.data.get_or_init(|| data))
    }

    pub fn order(&self) -> Result<i64> {
        self.data().map(|data| data.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_reserved_keys_are_stripped() {
        let data = FragmentData::from_value(
            Path::new("a.config.yaml"),
            json!({
                "$order": 5,
                "$merge": {"list": "replace", "tools[\"x.y\"].args": "insert"},
                "list": [1],
            }),
        )
        .unwrap();
        assert_eq!(data.order, 5);
        assert_eq!(data.value, json!({"list": [1]}).as_object().unwrap().clone());
        assert_eq!(data.overrides[&vec!["list".to_string()]], MergeMode::Replace);
        assert_eq!(
            data.overrides[&vec!["tools".to_string(), "x.y".to_string(), "args".to_string()]],
            MergeMode::Insert
        );
    }

    #[test]
    fn test_invalid_metadata() {
        let path = Path::new("a.config.yaml");
        assert!(FragmentData::from_value(path, json!(["not", "a", "map"])).is_err());
        assert!(FragmentData::from_value(path, json!({"$order": "high"})).is_err());
        assert!(FragmentData::from_value(path, json!({"$order": 1.5})).is_err());
        assert!(FragmentData::from_value(path, json!({"$merge": {"a": "merge"}})).is_err());
        assert!(FragmentData::from_value(path, json!({"$merge": {"a[0]": "replace"}})).is_err());
        assert!(FragmentData::from_value(path, json!({"$merge": ["a"]})).is_err());
    }

    #[test]
    fn test_fragment_loads_lazily() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.config.toml");
        fs::write(&path, "\"$order\" = 2\n[server]\nport = 80\n").unwrap();

        let fragment = ConfigFragment::new(path.clone());
        assert!(fragment.data.get().is_none());
        assert_eq!(fragment.order().unwrap(), 2);
        assert!(fragment.data.get().is_some());

        // Later edits are not seen once loaded
        fs::write(&path, "\"$order\" = 9\n").unwrap();
        assert_eq!(fragment.order().unwrap(), 2);
        assert_eq!(fragment.data().unwrap().value["server"], json!({"port": 80}));
    }
}
