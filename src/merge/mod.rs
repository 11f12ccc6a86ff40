//! # Config Merge Engine
//!
//! Every structured-config resource (`*.config.yaml`, `*.config.toml`, ...)
//! of every loaded project becomes a [`ConfigFragment`]. [`merge_all`] folds
//! them into one value tree plus a parallel trace tree recording which file
//! last wrote each leaf.
//!
//! ## Fragment metadata
//!
//! Two reserved top-level keys are stripped before merging:
//!
//! - `$order`: integer priority, default `0`. Fragments are applied in
//!   descending order; ties keep discovery order.
//! - `$merge`: a mapping of key path to merge mode (`replace`, `insert` or
//!   `append`). Key paths are parsed by [`parse_key_path`], so
//!   `tools["name.with.dots"]` addresses a key containing dots.
//!
//! ## Merge rules
//!
//! - mapping onto mapping: deep merge, unless a mode says `replace`
//! - sequence onto sequence: items of higher orders first, then lower ones;
//!   `replace` keeps one fragment's items only
//! - a mode declared by a higher order also governs lower fragments reaching
//!   the same key
//! - scalars and nulls overwrite
//! - any other shape change is an error naming the file and key

pub mod engine;
pub mod fragment;

pub use engine::{merge_all, merge_fragments, MergedConfig};
pub use fragment::{ConfigFragment, MergeMode};

/// Split a `$merge` key into mapping keys.
///
/// Segments are separated by `.`; `\` escapes the next character and a
/// quoted bracket (`["a.b"]` or `['a.b']`) holds a key verbatim. Sequence
/// items cannot be addressed, so `list[0]` is rejected.
///
/// ```
/// use stitch::merge::parse_key_path;
///
/// assert_eq!(
///     parse_key_path(r#"tools["fmt.rs"].args"#).unwrap(),
///     vec!["tools", "fmt.rs", "args"]
/// );
/// assert!(parse_key_path("list[0]").is_err());
/// ```
pub fn parse_key_path(key: &str) -> Result<Vec<String>, String> {
    let mut keys = Vec::new();
    let mut current = String::new();
    // A segment just closed by a bracket may be followed by `.` or `[` only
    let mut closed = false;
    let mut chars = key.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| format!("'{}' ends with a lone escape", key))?;
                current.push(escaped);
            }
            '.' => {
                if current.is_empty() && !closed {
                    return Err(format!("'{}' has an empty segment", key));
                }
                if !current.is_empty() {
                    keys.push(std::mem::take(&mut current));
                }
                closed = false;
                continue;
            }
            '[' => {
                if !current.is_empty() {
                    keys.push(std::mem::take(&mut current));
                }
                let quote = match chars.next() {
                    Some(quote @ ('"' | '\'')) => quote,
                    _ => return Err(format!("'{}' addresses a sequence item or an unquoted bracket", key)),
                };
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => quoted.push(escaped),
                            None => return Err(format!("'{}' ends with a lone escape", key)),
                        },
                        Some(ch) if ch == quote => break,
                        Some(ch) => quoted.push(ch),
                        None => return Err(format!("'{}' has an unterminated quote", key)),
                    }
                }
                if chars.next() != Some(']') {
                    return Err(format!("'{}' is missing ']' after a quoted key", key));
                }
                if quoted.is_empty() {
                    return Err(format!("'{}' has an empty segment", key));
                }
                keys.push(quoted);
                closed = true;
                continue;
            }
            _ if closed => return Err(format!("'{}' needs '.' after ']'", key)),
            _ => current.push(ch),
        }
        closed = false;
    }

    if !current.is_empty() {
        keys.push(current);
    } else if !closed {
        return Err(format!("'{}' has an empty segment", key));
    }
    Ok(keys)
}
