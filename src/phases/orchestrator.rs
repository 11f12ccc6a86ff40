//! Orchestrator for a complete composition
//!
//! Coordinates the phases into one call:
//! 1. Discover the project closure from the profile's main project and
//!    additions (options resolve and resources are scanned as projects load)
//! 2. Merge every config fragment of the closure
//!
//! Materializing the result is left to [`super::write::materialize`].

use std::path::Path;

use log::info;
use serde_json::{json, Map, Value as JsonValue};

use super::discovery::Loader;
use super::resources::TargetIndex;
use crate::error::{ErrorContext, Result, ResultExt};
use crate::evaluator::EvalContext;
use crate::merge::{merge_all, MergedConfig};
use crate::options::ApplicationOption;
use crate::profile::Profile;
use crate::project::{Project, ProjectId, ProjectSet};

/// Everything a composition run produced.
#[derive(Debug)]
pub struct Composition {
    pub projects: ProjectSet,
    /// Load order; the main project comes first.
    pub order: Vec<ProjectId>,
    pub merged: MergedConfig,
    pub options: ApplicationOption,
    pub targets: TargetIndex,
}

impl Composition {
    pub fn main(&self) -> &Project {
        self.projects.get(self.order[0])
    }

    /// Projects in load order.
    pub fn loaded(&self) -> impl Iterator<Item = &Project> {
        self.order.iter().map(|id| self.projects.get(*id))
    }

    /// Deduplicated output targets, sorted.
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.targets().map(|(target, _)| target).collect()
    }

    /// Resolved options of every loaded project, by project name.
    pub fn options_by_project(&self) -> Map<String, JsonValue> {
        let mut all = Map::new();
        for project in self.loaded() {
            all.entry(project.name().to_string())
                .or_insert_with(|| JsonValue::Object(project.options.to_context_map()));
        }
        all
    }

    /// Context templates of `project` render with.
    ///
    /// Top-level merged config keys come first, shadowed by the project's own
    /// options, then `config`, `common`, `options` and `project`.
    pub fn render_context(&self, project: &Project) -> EvalContext {
        let mut ctx = EvalContext::new();
        if let JsonValue::Object(config) = &self.merged.value {
            ctx.set_root_data(config.clone());
        }
        ctx.set_root_data(project.options.to_context_map())
            .set_data("config", self.merged.value.clone())
            .set_data("common", self.options.common().to_json())
            .set_data("options", JsonValue::Object(self.options_by_project()))
            .set_data(
                "project",
                json!({"name": project.name(), "dir": project.dir()}),
            );
        ctx
    }
}

/// Compose the project graph described by `profile`.
pub fn compose(profile: &Profile) -> Result<Composition> {
    compose_with(Loader::from_profile(profile)?, profile)
}

/// Compose with a prepared loader.
pub fn compose_with(mut loader: Loader, profile: &Profile) -> Result<Composition> {
    // Phase 1: Discovery
    let main_link = profile.main_link()?;
    let main = loader.load_link(&main_link)?;
    let mut additions = Vec::new();
    for link in profile.addition_links()? {
        additions.push(loader.load_link(&link)?);
    }
    let order = loader.expand_closure(main, additions)?;
    let (projects, options, targets) = loader.finish();
    info!(
        "loaded {} projects with {} output targets",
        order.len(),
        targets.len()
    );

    // Phase 2: Config merge
    let loaded: Vec<&Project> = order.iter().map(|id| projects.get(*id)).collect();
    let merged = merge_all(&loaded)
        .with_context(|| ErrorContext::new().with("main", &main_link.raw))?;

    Ok(Composition {
        projects,
        order,
        merged,
        options,
        targets,
    })
}

/// Compose, then write the artifact to `output`.
pub fn build(profile: &Profile, output: &Path) -> Result<Composition> {
    let composition = compose(profile)?;
    super::write::materialize(&composition, output)?;
    Ok(composition)
}
