//! Typed option values.
//!
//! Options are declared with one of six types. Values coming from raw strings
//! (profile assigns, propagated assigns, rendered templates) are parsed with
//! [`OptionValue::parse`]; values coming from typed trees (exports, computed
//! expressions, declaration defaults) are checked with
//! [`OptionValue::from_json`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{Error, Result};

/// Declared type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    String,
    Bool,
    Integer,
    Decimal,
    Object,
    Array,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::String => "string",
            OptionType::Bool => "bool",
            OptionType::Integer => "integer",
            OptionType::Decimal => "decimal",
            OptionType::Object => "object",
            OptionType::Array => "array",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Object(Map<String, JsonValue>),
    Array(Vec<JsonValue>),
}

impl OptionValue {
    /// The type this value belongs to.
    pub fn option_type(&self) -> OptionType {
        match self {
            OptionValue::String(_) => OptionType::String,
            OptionValue::Bool(_) => OptionType::Bool,
            OptionValue::Integer(_) => OptionType::Integer,
            OptionValue::Decimal(_) => OptionType::Decimal,
            OptionValue::Object(_) => OptionType::Object,
            OptionValue::Array(_) => OptionType::Array,
        }
    }

    /// Parse a raw string as the given type.
    pub fn parse(raw: &str, ty: OptionType) -> Result<Self> {
        let mismatch = || Error::TypeMismatch {
            expected: ty.to_string(),
            value: format!("{:?}", raw),
        };

        match ty {
            OptionType::String => Ok(OptionValue::String(raw.to_string())),
            OptionType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(OptionValue::Bool(true)),
                "false" | "no" | "0" => Ok(OptionValue::Bool(false)),
                _ => Err(mismatch()),
            },
            OptionType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(OptionValue::Integer)
                .map_err(|_| mismatch()),
            OptionType::Decimal => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(OptionValue::Decimal)
                .ok_or_else(mismatch),
            OptionType::Object | OptionType::Array => {
                let tree: JsonValue = serde_yaml::from_str(raw).map_err(|_| mismatch())?;
                Self::from_json(&tree, ty)
            }
        }
    }

    /// Check a typed tree against the given type.
    ///
    /// Decimals accept integers and strings accept any scalar; everything
    /// else must match exactly.
    pub fn from_json(value: &JsonValue, ty: OptionType) -> Result<Self> {
        let converted = match (ty, value) {
            (OptionType::String, JsonValue::String(s)) => Some(OptionValue::String(s.clone())),
            (OptionType::String, JsonValue::Bool(b)) => Some(OptionValue::String(b.to_string())),
            (OptionType::String, JsonValue::Number(n)) => Some(OptionValue::String(n.to_string())),
            (OptionType::Bool, JsonValue::Bool(b)) => Some(OptionValue::Bool(*b)),
            (OptionType::Integer, JsonValue::Number(n)) => n.as_i64().map(OptionValue::Integer),
            (OptionType::Decimal, JsonValue::Number(n)) => n.as_f64().map(OptionValue::Decimal),
            (OptionType::Object, JsonValue::Object(map)) => Some(OptionValue::Object(map.clone())),
            (OptionType::Array, JsonValue::Array(items)) => Some(OptionValue::Array(items.clone())),
            _ => None,
        };

        converted.ok_or_else(|| Error::TypeMismatch {
            expected: ty.to_string(),
            value: value.to_string(),
        })
    }

    /// Infer a value from an untyped tree (used for profile exports).
    pub fn infer(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::String(s) => Ok(OptionValue::String(s.clone())),
            JsonValue::Bool(b) => Ok(OptionValue::Bool(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(OptionValue::Integer(i)),
                None => n.as_f64().map(OptionValue::Decimal).ok_or_else(|| {
                    Error::TypeMismatch {
                        expected: "number".to_string(),
                        value: n.to_string(),
                    }
                }),
            },
            JsonValue::Object(map) => Ok(OptionValue::Object(map.clone())),
            JsonValue::Array(items) => Ok(OptionValue::Array(items.clone())),
            JsonValue::Null => Err(Error::TypeMismatch {
                expected: "a value".to_string(),
                value: "null".to_string(),
            }),
        }
    }

    /// Whether this value can be used for an option of type `ty`.
    pub fn fits(&self, ty: OptionType) -> bool {
        let actual = self.option_type();
        actual == ty || (ty == OptionType::Decimal && actual == OptionType::Integer)
    }

    /// Convert into the shape the declared type expects (integer → decimal).
    pub fn coerce(self, ty: OptionType) -> Result<Self> {
        match (self, ty) {
            (OptionValue::Integer(i), OptionType::Decimal) => Ok(OptionValue::Decimal(i as f64)),
            (value, ty) if value.option_type() == ty => Ok(value),
            (value, ty) => Err(Error::TypeMismatch {
                expected: ty.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            OptionValue::String(s) => JsonValue::String(s.clone()),
            OptionValue::Bool(b) => JsonValue::Bool(*b),
            OptionValue::Integer(i) => JsonValue::Number(Number::from(*i)),
            OptionValue::Decimal(d) => Number::from_f64(*d)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            OptionValue::Object(map) => JsonValue::Object(map.clone()),
            OptionValue::Array(items) => JsonValue::Array(items.clone()),
        }
    }

    /// The raw string form, as it would be written in an assign.
    ///
    /// Strings are returned verbatim; structured values are JSON.
    pub fn to_raw_string(&self) -> String {
        match self {
            OptionValue::String(s) => s.clone(),
            other => other.to_json().to_string(),
        }
    }
}

impl fmt::Display for OptionValue {
    /// Values render as JSON so strings are visibly quoted in messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
