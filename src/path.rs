//! Path manipulation utilities for stitch

use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::{Error, Result};

/// Compile a glob pattern.
pub fn compile_glob(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(Error::Glob)
}

/// Match a `/`-separated relative path against a compiled glob.
///
/// `*` does not cross directory separators; use `**` for recursive matches.
pub fn glob_matches(pattern: &Pattern, path: &str) -> bool {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    pattern.matches_with(path, options)
}

/// Match a path against a glob pattern
pub fn glob_match(pattern: &str, path: &str) -> Result<bool> {
    Ok(glob_matches(&compile_glob(pattern)?, path))
}

/// Encode one path segment so it is safe on every supported filesystem.
///
/// Separators and reserved characters are replaced 1:1, so distinct inputs of
/// the same shape stay distinct. `.` and `..` are escaped so a segment can
/// never climb out of its parent.
pub fn encode_path_segment(segment: &str) -> String {
    let encoded: String = segment
        .chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect();

    match encoded.as_str() {
        "" => "_".to_string(),
        "." => "_.".to_string(),
        ".." => "_..".to_string(),
        _ => encoded,
    }
}

/// Fold `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let climbs = matches!(result.components().next_back(), Some(Component::ParentDir));
                if climbs || (!result.pop() && !path.is_absolute()) {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// Render a relative path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.sh", "run.sh").unwrap());
        assert!(glob_match("bin/*.sh", "bin/run.sh").unwrap());
        assert!(!glob_match("*.sh", "run.py").unwrap());
        assert!(glob_match("**/*.sh", "lib/nested/run.sh").unwrap());
        assert!(!glob_match("*.sh", "lib/run.sh").unwrap());
    }

    #[test]
    fn test_glob_match_invalid_pattern() {
        assert!(matches!(glob_match("[", "x"), Err(Error::Glob(_))));
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("github.com"), "github.com");
        assert_eq!(encode_path_segment("feature/x"), "feature-x");
        assert_eq!(encode_path_segment("host:22"), "host_22");
        assert_eq!(encode_path_segment(".."), "_..");
        assert_eq!(encode_path_segment(""), "_");
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize_lexically(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_lexically(Path::new("../a")), PathBuf::from("../a"));
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("a/b/c.sh")), "a/b/c.sh");
        assert_eq!(to_slash(Path::new("./a")), "a");
    }
}
