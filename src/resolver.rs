//! # Link Resolution
//!
//! Turns a parsed [`ProjectLink`] into a [`ProjectLinkTarget`]: an absolute
//! directory plus, for git-hosted projects, the checkout that has to be
//! fetched before the directory can be read.
//!
//! Resolution is bounded:
//!
//! 1. A registry link goes through exactly one registry hop. The first rule
//!    (in profile order) with the same name whose `match` holds renders its
//!    link template; the result must be a `dir:` or `git:` link.
//! 2. The physical directory is computed. `dir:` links use their path;
//!    `git:` links map to a deterministic checkout under the workspace.
//! 3. One redirect hop. The candidates `[normalized link, "dir:" + directory]`
//!    are tested against each redirect rule in order. The first rule whose
//!    regex matches a candidate and whose `match` holds renders a new link,
//!    which gets at most one registry hop of its own. A redirected link is
//!    never redirected again.

use std::path::{Path, PathBuf};

use log::debug;
use regex::Regex;
use serde_json::{json, Value as JsonValue};
use url::Url;

use crate::error::{Error, Result};
use crate::evaluator::{EvalContext, Evaluator};
use crate::link::{validate_name, GitRef, LinkTarget, ProjectLink};
use crate::path::encode_path_segment;
use crate::profile::{RedirectRule, RegistryRule};

/// A git checkout that must be present before a project can be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSpec {
    pub url: Url,
    pub r#ref: GitRef,
    /// Checkout root (the project may live in a sub-directory of it).
    pub checkout: PathBuf,
}

/// Where a link points, physically.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectLinkTarget {
    /// Absolute project directory.
    pub dir: PathBuf,
    pub git: Option<GitSpec>,
    /// The final `dir:`/`git:` link after registry and redirect hops.
    pub link: ProjectLink,
}

/// Deterministic checkout directory for `url` at `ref` under `workspace`.
///
/// Layout: `<workspace>/git/<host>/<repo path>/<refType>/<refName>`, with
/// every segment made filesystem-safe and a trailing `.git` dropped from the
/// repository path.
pub fn get_project_dir(workspace: &Path, url: &Url, r#ref: &GitRef) -> PathBuf {
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => url.scheme().to_string(),
    };

    let mut dir = workspace.join("git").join(encode_path_segment(&host.to_ascii_lowercase()));
    let repo_path = url.path().trim_matches('/');
    let repo_path = repo_path.strip_suffix(".git").unwrap_or(repo_path);
    for segment in repo_path.split('/').filter(|segment| !segment.is_empty()) {
        dir.push(encode_path_segment(segment));
    }

    dir.join(r#ref.kind.as_str()).join(encode_path_segment(&r#ref.name))
}

struct CompiledRedirect {
    regex: Regex,
    rule: RedirectRule,
}

/// Resolves links through registries and redirects.
pub struct LinkResolver {
    workspace: PathBuf,
    registries: Vec<RegistryRule>,
    redirects: Vec<CompiledRedirect>,
    common: JsonValue,
    evaluator: Evaluator,
}

impl LinkResolver {
    /// Validate the rules and compile every redirect regex up front.
    pub fn new(
        workspace: &Path,
        registries: &[RegistryRule],
        redirects: &[RedirectRule],
        common: JsonValue,
    ) -> Result<Self> {
        for rule in registries {
            validate_name("registry", &rule.name)?;
        }

        let redirects = redirects
            .iter()
            .map(|rule| {
                Ok(CompiledRedirect {
                    regex: Regex::new(&rule.regex)?,
                    rule: rule.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            workspace: workspace.to_path_buf(),
            registries: registries.to_vec(),
            redirects,
            common,
            evaluator: Evaluator::new(),
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Resolve `link` to its physical location.
    pub fn resolve(&self, link: &ProjectLink) -> Result<ProjectLinkTarget> {
        let concrete = self.registry_hop(link)?;
        let target = self.locate(concrete, link)?;

        match self.redirect_hop(&target, link)? {
            Some(redirected) => {
                debug!("redirected {} -> {}", target.link, redirected.link);
                Ok(redirected)
            }
            None => Ok(target),
        }
    }

    fn base_context(&self) -> EvalContext {
        let mut ctx = EvalContext::new();
        ctx.set_data("common", self.common.clone());
        ctx
    }

    /// Replace a registry link by the link its first matching rule renders.
    fn registry_hop(&self, link: &ProjectLink) -> Result<ProjectLink> {
        let LinkTarget::Registry { name, path, r#ref } = &link.target else {
            return Ok(link.clone());
        };

        let mut ctx = self.base_context();
        ctx.set_data("name", json!(name))
            .set_data("path", json!(path))
            .set_data("ref", json!(r#ref.to_string()))
            .set_data("refType", json!(r#ref.kind.as_str()))
            .set_data("refName", json!(r#ref.name));

        for rule in self.registries.iter().filter(|rule| &rule.name == name) {
            let matched = self
                .evaluator
                .eval_bool_expr(rule.match_expr.as_deref().unwrap_or(""), &ctx)
                .map_err(|err| resolve_error(link, format!("registry '{}' match: {}", name, err)))?;
            if !matched {
                continue;
            }

            let rendered = self
                .evaluator
                .eval_string_template(&rule.link, &ctx)
                .map_err(|err| resolve_error(link, format!("registry '{}': {}", name, err)))?;
            let resolved = ProjectLink::parse(rendered.trim())
                .map_err(|err| resolve_error(link, format!("registry '{}': {}", name, err)))?;

            if matches!(resolved.target, LinkTarget::Registry { .. }) {
                return Err(resolve_error(
                    link,
                    format!(
                        "registry '{}' resolved to another registry link '{}'",
                        name, resolved.normalized
                    ),
                ));
            }
            debug!("registry {} -> {}", link.normalized, resolved.normalized);
            return Ok(resolved);
        }

        Err(Error::RegistryNotFound {
            raw: link.raw.clone(),
            name: name.clone(),
        })
    }

    /// Compute the physical directory of a `dir:` or `git:` link.
    fn locate(&self, link: ProjectLink, original: &ProjectLink) -> Result<ProjectLinkTarget> {
        match &link.target {
            LinkTarget::Dir { path } => Ok(ProjectLinkTarget {
                dir: path.clone(),
                git: None,
                link,
            }),
            LinkTarget::Git { url, r#ref, path } => {
                let checkout = get_project_dir(&self.workspace, url, r#ref);
                let dir = path
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .fold(checkout.clone(), |dir, segment| dir.join(segment));
                Ok(ProjectLinkTarget {
                    dir,
                    git: Some(GitSpec {
                        url: url.clone(),
                        r#ref: r#ref.clone(),
                        checkout,
                    }),
                    link,
                })
            }
            LinkTarget::Registry { .. } => Err(resolve_error(
                original,
                format!("unresolved registry link '{}'", link.normalized),
            )),
        }
    }

    fn redirect_hop(
        &self,
        target: &ProjectLinkTarget,
        original: &ProjectLink,
    ) -> Result<Option<ProjectLinkTarget>> {
        let candidates = [
            target.link.normalized.clone(),
            format!("dir:{}", target.dir.display()),
        ];

        for redirect in &self.redirects {
            for candidate in &candidates {
                let Some(captures) = redirect.regex.captures(candidate) else {
                    continue;
                };

                let mut ctx = self.base_context();
                let groups: Vec<JsonValue> = captures
                    .iter()
                    .map(|group| json!(group.map(|m| m.as_str()).unwrap_or("")))
                    .collect();
                for name in redirect.regex.capture_names().flatten() {
                    if let Some(value) = captures.name(name) {
                        ctx.set_data(name, json!(value.as_str()));
                    }
                }
                ctx.set_data("groups", JsonValue::Array(groups))
                    .set_data("link", json!(candidate));

                let matched = self
                    .evaluator
                    .eval_bool_expr(redirect.rule.match_expr.as_deref().unwrap_or(""), &ctx)
                    .map_err(|err| {
                        resolve_error(original, format!("redirect '{}' match: {}", redirect.rule.regex, err))
                    })?;
                if !matched {
                    continue;
                }

                let rendered = self
                    .evaluator
                    .eval_string_template(&redirect.rule.link, &ctx)
                    .map_err(|err| {
                        resolve_error(original, format!("redirect '{}': {}", redirect.rule.regex, err))
                    })?;
                let redirected = ProjectLink::parse(rendered.trim()).map_err(|err| {
                    resolve_error(original, format!("redirect '{}': {}", redirect.rule.regex, err))
                })?;
                let concrete = self
                    .registry_hop(&redirected)
                    .map_err(|err| resolve_error(original, err.to_string()))?;
                return self.locate(concrete, original).map(Some);
            }
        }

        Ok(None)
    }
}

fn resolve_error(link: &ProjectLink, message: String) -> Error {
    Error::Resolve {
        raw: link.raw.clone(),
        message,
    }
}
