//! # Project Links
//!
//! A link is a URI-like string that says where a project lives. Three forms
//! are supported:
//!
//! | Prefix | Form | Example |
//! |---|---|---|
//! | `registry:` or `@` | `name[/path][#ref=REF]` | `@stdlib/shell#ref=tag/v1` |
//! | `dir:` | absolute path | `dir:/opt/projects/base` |
//! | `git:` | `url[#ref=REF][&path=SUBDIR]` | `git:https://example.com/repo.git#ref=dev` |
//!
//! A ref is `tag/NAME`, `branch/NAME`, or a bare `NAME` (a branch). When no
//! `#ref=` is given at all the ref defaults to `branch/main`; an explicit
//! empty ref is an error.
//!
//! Every parsed link carries a `normalized` string that is a pure function of
//! its parsed fields. It is used as a dedup key, and re-parsing it yields the
//! same link.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};
use crate::path::normalize_lexically;

/// Pattern every project and registry name must match.
pub const NAME_PATTERN: &str = "^[a-z][a-z0-9-]*[a-z0-9]$";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NAME_PATTERN).expect("name pattern is valid"));

const REF_SEPARATOR: &str = "#ref=";
const PATH_PARAM: &str = "&path=";
const DEFAULT_BRANCH: &str = "main";
const GIT_SCHEMES: &[&str] = &["https", "http", "ssh", "git", "file"];

/// Check a project or registry name.
pub fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidName {
            kind,
            name: name.to_string(),
            pattern: NAME_PATTERN,
        })
    }
}

/// Kind of git ref a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Branch,
    Tag,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Branch => "branch",
            RefKind::Tag => "tag",
        }
    }
}

/// A parsed git ref (`branch/main`, `tag/v1.2.0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GitRef {
    pub kind: RefKind,
    pub name: String,
}

impl GitRef {
    pub fn branch(name: &str) -> Self {
        Self {
            kind: RefKind::Branch,
            name: name.to_string(),
        }
    }

    pub fn tag(name: &str) -> Self {
        Self {
            kind: RefKind::Tag,
            name: name.to_string(),
        }
    }

    /// Parse a ref: `tag/NAME`, `branch/NAME`, or bare `NAME` (branch).
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::RefParse {
                raw: raw.to_string(),
                message: "ref is empty".to_string(),
            });
        }

        let (kind, name) = if let Some(name) = raw.strip_prefix("tag/") {
            (RefKind::Tag, name)
        } else if let Some(name) = raw.strip_prefix("branch/") {
            (RefKind::Branch, name)
        } else {
            (RefKind::Branch, raw)
        };

        validate_ref_name(raw, name)?;
        Ok(Self {
            kind,
            name: name.to_string(),
        })
    }
}

impl Default for GitRef {
    fn default() -> Self {
        Self::branch(DEFAULT_BRANCH)
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.name)
    }
}

fn validate_ref_name(raw: &str, name: &str) -> Result<()> {
    let message = if name.is_empty() {
        Some("ref name is empty")
    } else if name.starts_with('-') || name.starts_with('/') || name.ends_with('/') {
        Some("ref name must not start with '-' or '/' or end with '/'")
    } else if name.contains("..") {
        Some("ref name must not contain '..'")
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'))
    {
        Some("ref name may only contain [A-Za-z0-9._/-]")
    } else {
        None
    };

    match message {
        Some(message) => Err(Error::RefParse {
            raw: raw.to_string(),
            message: message.to_string(),
        }),
        None => Ok(()),
    }
}

/// Kind of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Registry,
    Dir,
    Git,
}

/// Parsed payload of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkTarget {
    Registry {
        name: String,
        /// Sub-path below the registry entry, `/`-separated, possibly empty.
        path: String,
        r#ref: GitRef,
    },
    Dir {
        path: PathBuf,
    },
    Git {
        url: Url,
        r#ref: GitRef,
        /// Sub-directory of the checkout holding the project, possibly empty.
        path: String,
    },
}

/// A parsed project link. Immutable once parsed.
#[derive(Debug, Clone)]
pub struct ProjectLink {
    pub raw: String,
    pub normalized: String,
    pub target: LinkTarget,
}

impl PartialEq for ProjectLink {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl Eq for ProjectLink {}

impl ProjectLink {
    /// Parse a link. Relative `dir:` paths are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::parse_in(raw, None)
    }

    /// Parse a link, resolving a relative `dir:` path against `base`.
    pub fn parse_in(raw: &str, base: Option<&Path>) -> Result<Self> {
        let target = if let Some(rest) = raw.strip_prefix("registry:") {
            parse_registry(raw, rest)?
        } else if let Some(rest) = raw.strip_prefix('@') {
            parse_registry(raw, rest)?
        } else if let Some(rest) = raw.strip_prefix("dir:") {
            parse_dir(raw, rest, base)?
        } else if let Some(rest) = raw.strip_prefix("git:") {
            parse_git(raw, rest)?
        } else {
            return Err(link_error(
                raw,
                "unknown link type; expected a 'registry:', '@', 'dir:' or 'git:' prefix",
            ));
        };

        let normalized = normalize(&target);
        Ok(Self {
            raw: raw.to_string(),
            normalized,
            target,
        })
    }

    pub fn kind(&self) -> LinkKind {
        match self.target {
            LinkTarget::Registry { .. } => LinkKind::Registry,
            LinkTarget::Dir { .. } => LinkKind::Dir,
            LinkTarget::Git { .. } => LinkKind::Git,
        }
    }

    /// Shorthand for a `dir:` link to an absolute path.
    pub fn from_dir(path: &Path) -> Result<Self> {
        Self::parse(&format!("dir:{}", path.display()))
    }
}

impl fmt::Display for ProjectLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

fn link_error(raw: &str, message: impl Into<String>) -> Error {
    Error::LinkParse {
        raw: raw.to_string(),
        message: message.into(),
    }
}

/// Split `body#ref=REF` into the body and the parsed ref.
fn split_ref<'a>(raw: &str, body: &'a str) -> Result<(&'a str, Option<&'a str>)> {
    match body.find('#') {
        None => Ok((body, None)),
        Some(idx) => {
            let fragment = &body[idx..];
            match fragment.strip_prefix(REF_SEPARATOR) {
                Some(rest) => Ok((&body[..idx], Some(rest))),
                None => Err(link_error(
                    raw,
                    format!("unsupported fragment '{}'; expected '#ref=REF'", fragment),
                )),
            }
        }
    }
}

fn parse_ref(raw: &str, value: Option<&str>) -> Result<GitRef> {
    match value {
        None => Ok(GitRef::default()),
        Some("") => Err(link_error(raw, "ref is empty after '#ref='")),
        Some(value) => GitRef::parse(value).map_err(|err| link_error(raw, err.to_string())),
    }
}

fn parse_registry(raw: &str, rest: &str) -> Result<LinkTarget> {
    let (body, ref_value) = split_ref(raw, rest)?;
    if body.is_empty() {
        return Err(link_error(raw, "registry name is empty"));
    }

    let (name, path) = match body.split_once('/') {
        Some((name, path)) => (name, path),
        None => (body, ""),
    };
    validate_name("registry", name).map_err(|err| link_error(raw, err.to_string()))?;

    if !path.is_empty()
        && path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(link_error(
            raw,
            format!("invalid registry path '{}'", path),
        ));
    }

    Ok(LinkTarget::Registry {
        name: name.to_string(),
        path: path.to_string(),
        r#ref: parse_ref(raw, ref_value)?,
    })
}

fn parse_dir(raw: &str, rest: &str, base: Option<&Path>) -> Result<LinkTarget> {
    if rest.is_empty() {
        return Err(link_error(raw, "directory path is empty"));
    }

    let path = Path::new(rest);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match base {
            Some(base) => base.join(path),
            None => {
                return Err(link_error(
                    raw,
                    "directory path must be absolute",
                ))
            }
        }
    };

    Ok(LinkTarget::Dir {
        path: normalize_lexically(&absolute),
    })
}

fn parse_git(raw: &str, rest: &str) -> Result<LinkTarget> {
    let (body, ref_part) = split_ref(raw, rest)?;

    let (body, ref_value, path) = match ref_part {
        Some(value) => match value.split_once(PATH_PARAM) {
            Some((ref_value, path)) => (body, Some(ref_value), path),
            None => (body, Some(value), ""),
        },
        // Without a ref the sub-path trails the url itself.
        None => match body.split_once(PATH_PARAM) {
            Some((body, path)) => (body, None, path),
            None => (body, None, ""),
        },
    };

    if body.is_empty() {
        return Err(link_error(raw, "git url is empty"));
    }

    let url = Url::parse(body).map_err(|err| link_error(raw, format!("malformed url: {}", err)))?;
    if !GIT_SCHEMES.contains(&url.scheme()) {
        return Err(link_error(
            raw,
            format!("unsupported url scheme '{}'", url.scheme()),
        ));
    }
    if url.scheme() != "file" && url.host_str().is_none_or(str::is_empty) {
        return Err(link_error(raw, "git url has no host"));
    }

    let path = path.trim_matches('/');
    if path
        .split('/')
        .any(|segment| segment == "." || segment == "..")
    {
        return Err(link_error(raw, format!("invalid sub-path '{}'", path)));
    }

    Ok(LinkTarget::Git {
        url,
        r#ref: parse_ref(raw, ref_value)?,
        path: path.to_string(),
    })
}

fn normalize(target: &LinkTarget) -> String {
    match target {
        LinkTarget::Registry { name, path, r#ref } => {
            if path.is_empty() {
                format!("registry:{}{}{}", name, REF_SEPARATOR, r#ref)
            } else {
                format!("registry:{}/{}{}{}", name, path, REF_SEPARATOR, r#ref)
            }
        }
        LinkTarget::Dir { path } => format!("dir:{}", path.display()),
        LinkTarget::Git { url, r#ref, path } => {
            if path.is_empty() {
                format!("git:{}{}{}", url, REF_SEPARATOR, r#ref)
            } else {
                format!("git:{}{}{}{}{}", url, REF_SEPARATOR, r#ref, PATH_PARAM, path)
            }
        }
    }
}
