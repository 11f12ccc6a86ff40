//! Structured file loading.
//!
//! YAML, TOML and JSON files are all loaded into a generic
//! `serde_json::Value` tree. The format is picked from the file extension.
//! A missing file is reported as [`Error::NotFound`], distinct from a file
//! that exists but does not parse ([`Error::StructuredParse`]).

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Extensions tried, in order, when looking a file up by base name.
pub const STRUCTURED_EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "json"];

/// Supported structured formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(Format::Yaml),
            "toml" => Some(Format::Toml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

/// Find the first `<base>.<ext>` that exists in `dir`, trying base names in
/// order and extensions in [`STRUCTURED_EXTENSIONS`] order.
pub fn find_structured_file(dir: &Path, base_names: &[&str]) -> Result<PathBuf> {
    for base in base_names {
        for ext in STRUCTURED_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", base, ext));
            if candidate.is_file() {
                debug!("found structured file {}", candidate.display());
                return Ok(candidate);
            }
        }
    }

    Err(Error::NotFound {
        what: format!("{}.{{{}}}", base_names.join("|"), STRUCTURED_EXTENSIONS.join(",")),
        dir: dir.to_path_buf(),
    })
}

/// Load a structured file into a generic tree.
pub fn load_structured_file(path: &Path) -> Result<JsonValue> {
    load_as(path)
}

/// Load a structured file and deserialize it into `T`.
pub fn load_as<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = Format::from_path(path).ok_or_else(|| Error::StructuredParse {
        path: path.to_path_buf(),
        message: "unknown structured file extension".to_string(),
    })?;

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound {
                what: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            })
        }
        Err(err) => return Err(Error::Io(err)),
    };

    parse_str(&content, format).map_err(|message| Error::StructuredParse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse text in the given format.
pub fn parse_str<T: DeserializeOwned>(content: &str, format: Format) -> std::result::Result<T, String> {
    match format {
        Format::Yaml => serde_yaml::from_str(content).map_err(|err| err.to_string()),
        Format::Toml => toml::from_str(content).map_err(|err| err.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|err| err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_find_prefers_base_order_then_extension_order() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("stitch.json"), "{}").unwrap();
        fs::write(temp.path().join("stitch.yaml"), "a: 1").unwrap();

        let found = find_structured_file(temp.path(), &["stitch"]).unwrap();
        assert!(found.ends_with("stitch.yaml"));
    }

    #[test]
    fn test_find_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = find_structured_file(temp.path(), &["stitch"]).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_load_each_format() {
        let temp = TempDir::new().unwrap();
        let yaml = temp.path().join("a.yaml");
        let toml_path = temp.path().join("a.toml");
        let json_path = temp.path().join("a.json");
        fs::write(&yaml, "server:\n  port: 8080\n").unwrap();
        fs::write(&toml_path, "[server]\nport = 8080\n").unwrap();
        fs::write(&json_path, r#"{"server": {"port": 8080}}"#).unwrap();

        let expected = json!({"server": {"port": 8080}});
        assert_eq!(load_structured_file(&yaml).unwrap(), expected);
        assert_eq!(load_structured_file(&toml_path).unwrap(), expected);
        assert_eq!(load_structured_file(&json_path).unwrap(), expected);
    }

    #[test]
    fn test_load_parse_error_is_distinct() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.yaml");
        fs::write(&path, "invalid: [unclosed").unwrap();

        assert!(matches!(
            load_structured_file(&path).unwrap_err(),
            Error::StructuredParse { .. }
        ));
        assert!(matches!(
            load_structured_file(&temp.path().join("absent.yaml")).unwrap_err(),
            Error::NotFound { .. }
        ));
    }
}
