//! Phase 1: Project discovery
//!
//! The [`Loader`] turns links into loaded [`Project`]s and walks the
//! dependency graph from the main project outward.
//!
//! ## Process
//!
//! 1.  **Locate**: a link is resolved to a directory (registry and redirect
//!     hops included). Git-hosted targets are fetched before anything is read
//!     from them.
//! 2.  **Load**: the declaration is read once per directory. Its options are
//!     resolved against the shared registries, which also propagates its
//!     assigns. Dependency edges are filtered by their `match` expressions and
//!     resolved, but their targets are only loaded when first traversed.
//!     Resources are scanned and their output targets claimed.
//! 3.  **Expand**: breadth-first from the main project, then from each
//!     addition. Projects are deduplicated by directory, never by name, so two
//!     links reaching the same checkout load it once.
//!
//! Options of a project resolve the moment it loads, so an assign only reaches
//! projects that load after the one declaring it.

use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;

use log::{debug, info};
use serde_json::json;

use crate::cache::SettingCache;
use crate::error::{ErrorContext, Result, ResultExt};
use crate::evaluator::{EvalContext, Evaluator};
use crate::link::ProjectLink;
use crate::options::{ApplicationOption, ProjectOptions};
use crate::phases::resources::{self, TargetIndex};
use crate::profile::Profile;
use crate::project::{Dependency, DependencyEdge, Project, ProjectId, ProjectSet};
use crate::repository::ProjectFetcher;
use crate::resolver::{LinkResolver, ProjectLinkTarget};
use crate::setting::ProjectSetting;

/// Loads projects and expands the dependency closure.
pub struct Loader {
    resolver: LinkResolver,
    fetcher: ProjectFetcher,
    settings: SettingCache,
    options: ApplicationOption,
    projects: ProjectSet,
    targets: TargetIndex,
    evaluator: Evaluator,
}

/// Fetch the target's checkout if it has one, then read its declaration.
fn load_target(
    fetcher: &mut ProjectFetcher,
    settings: &mut SettingCache,
    target: &ProjectLinkTarget,
) -> Result<Rc<ProjectSetting>> {
    if let Some(git) = &target.git {
        fetcher.fetch(git)?;
    }
    settings.load(&target.dir)
}

fn project_context(options: &ApplicationOption, setting: &ProjectSetting, resolved: &ProjectOptions) -> EvalContext {
    let mut ctx = options.base_context();
    ctx.set_root_data(resolved.to_context_map())
        .set_data("project", json!({"name": setting.name, "dir": setting.dir}));
    ctx
}

impl Loader {
    pub fn new(resolver: LinkResolver, fetcher: ProjectFetcher, options: ApplicationOption) -> Self {
        Self {
            resolver,
            fetcher,
            settings: SettingCache::new(),
            options,
            projects: ProjectSet::new(),
            targets: TargetIndex::new(),
            evaluator: Evaluator::new(),
        }
    }

    /// A loader configured by `profile`, fetching with the system `git`.
    pub fn from_profile(profile: &Profile) -> Result<Self> {
        let options = ApplicationOption::from_profile(profile)?;
        let resolver = LinkResolver::new(
            &profile.workspace(),
            &profile.registries,
            &profile.redirects,
            options.common().to_json(),
        )?;
        Ok(Self::new(resolver, ProjectFetcher::new(profile.offline), options))
    }

    pub fn projects(&self) -> &ProjectSet {
        &self.projects
    }

    pub fn options(&self) -> &ApplicationOption {
        &self.options
    }

    pub fn targets(&self) -> &TargetIndex {
        &self.targets
    }

    /// Give up the loader, keeping what it built.
    pub fn finish(self) -> (ProjectSet, ApplicationOption, TargetIndex) {
        (self.projects, self.options, self.targets)
    }

    /// Resolve `link` and read the declaration it points at.
    pub fn load_link(&mut self, link: &ProjectLink) -> Result<Rc<ProjectSetting>> {
        let target = self.resolver.resolve(link)?;
        load_target(&mut self.fetcher, &mut self.settings, &target)
            .with_context(|| ErrorContext::new().with("link", &link.raw))
    }

    /// Load the project declared by `setting`.
    ///
    /// A project already loaded under the same name is returned as is, so
    /// options resolve once per logical project.
    pub fn load_project(&mut self, setting: Rc<ProjectSetting>) -> Result<ProjectId> {
        if let Some(id) = self
            .projects
            .by_name(&setting.name)
            .or_else(|| self.projects.by_dir(&setting.dir))
        {
            return Ok(id);
        }

        let name = setting.name.clone();
        let dir = setting.dir.clone();
        self.load_new(setting, None, false)
            .with_context(|| ErrorContext::new().with("project", &name).with("dir", dir.display()))
    }

    /// Load a profile-level addition.
    ///
    /// An addition that shares its name with a loaded project reuses that
    /// project's resolved options. An addition in an already loaded
    /// directory is that project.
    pub fn load_addition(&mut self, setting: Rc<ProjectSetting>) -> Result<ProjectId> {
        if let Some(id) = self.projects.by_dir(&setting.dir) {
            return Ok(id);
        }

        let shared = self
            .projects
            .by_name(&setting.name)
            .map(|id| Rc::clone(&self.projects.get(id).options));
        let name = setting.name.clone();
        let dir = setting.dir.clone();
        self.load_new(setting, shared, true)
            .with_context(|| ErrorContext::new().with("addition", &name).with("dir", dir.display()))
    }

    fn load_new(
        &mut self,
        setting: Rc<ProjectSetting>,
        shared: Option<Rc<ProjectOptions>>,
        addition: bool,
    ) -> Result<ProjectId> {
        info!("loading project {} from {}", setting.name, setting.dir.display());

        let options = match shared {
            Some(options) => options,
            None => Rc::new(self.resolve_options(&setting)?),
        };

        let ctx = project_context(&self.options, &setting, &options);
        let dependency = self.resolve_edges(&setting, &ctx)?;

        let declarations = setting
            .resources
            .iter()
            .map(|declaration| {
                let matched = self
                    .evaluator
                    .eval_bool_expr(declaration.match_expr.as_deref().unwrap_or(""), &ctx)?;
                Ok(matched.then_some(declaration))
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        let resource = resources::scan(&setting.name, &setting.dir, &setting.file, &declarations)?;
        self.targets.register_all(&resource)?;

        Ok(self.projects.insert(Project {
            id: ProjectId(0),
            setting,
            options,
            dependency,
            resource,
            addition,
        }))
    }

    fn resolve_options(&mut self, setting: &ProjectSetting) -> Result<ProjectOptions> {
        let Self {
            resolver,
            fetcher,
            settings,
            options,
            ..
        } = self;

        let mut locate = |raw: &str| -> Result<String> {
            let link = ProjectLink::parse_in(raw, Some(&setting.dir))?;
            let target = resolver.resolve(&link)?;
            Ok(load_target(fetcher, settings, &target)?.name.clone())
        };
        options.resolve_project(setting, &mut locate)
    }

    fn resolve_edges(&self, setting: &ProjectSetting, ctx: &EvalContext) -> Result<Dependency> {
        let mut edges: Vec<DependencyEdge> = Vec::new();

        for declaration in &setting.dependencies {
            if !self
                .evaluator
                .eval_bool_expr(declaration.match_expr.as_deref().unwrap_or(""), ctx)?
            {
                debug!("{}: skipping dependency {}", setting.name, declaration.link);
                continue;
            }

            let link = ProjectLink::parse_in(&declaration.link, Some(&setting.dir))?;
            let target = self.resolver.resolve(&link)?;
            if target.dir == setting.dir {
                debug!("{}: dropping self dependency {}", setting.name, link);
                continue;
            }
            if edges.iter().any(|edge| edge.target.dir == target.dir) {
                debug!("{}: collapsing duplicate dependency {}", setting.name, link);
                continue;
            }

            edges.push(DependencyEdge {
                link,
                target,
                project: None,
            });
        }

        Ok(Dependency {
            edges,
            loaded: false,
        })
    }

    /// Targets of `id`'s edges, loading them on first use.
    pub fn dependencies(&mut self, id: ProjectId) -> Result<Vec<ProjectId>> {
        let project = self.projects.get(id);
        if project.dependency.loaded {
            return Ok(project.dependency.projects().collect());
        }

        let name = project.name().to_string();
        let targets: Vec<ProjectLinkTarget> = project
            .dependency
            .edges
            .iter()
            .map(|edge| edge.target.clone())
            .collect();

        let mut loaded = Vec::with_capacity(targets.len());
        for (index, target) in targets.iter().enumerate() {
            let setting = load_target(&mut self.fetcher, &mut self.settings, target)
                .with_context(|| {
                    ErrorContext::new()
                        .with("project", &name)
                        .with("dependency", &target.link)
                })?;
            let dep = self.load_project(setting)?;
            self.projects.get_mut(id).dependency.edges[index].project = Some(dep);
            loaded.push(dep);
        }

        self.projects.get_mut(id).dependency.loaded = true;
        Ok(loaded)
    }

    /// Load `main` and every addition with their transitive dependencies.
    ///
    /// Returns the project set in load order: main and its dependencies in
    /// discovery order, then each addition followed by its own. Each
    /// directory appears once.
    pub fn expand_closure(
        &mut self,
        main: Rc<ProjectSetting>,
        additions: Vec<Rc<ProjectSetting>>,
    ) -> Result<Vec<ProjectId>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();

        let main = self.load_project(main)?;
        self.expand_from(main, &mut order, &mut visited)?;

        for addition in additions {
            let id = self.load_addition(addition)?;
            self.expand_from(id, &mut order, &mut visited)?;
        }

        debug!(
            "closure holds {} projects from {} declarations",
            order.len(),
            self.settings.len()
        );
        Ok(order)
    }

    fn expand_from(
        &mut self,
        seed: ProjectId,
        order: &mut Vec<ProjectId>,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<()> {
        if !visited.insert(self.projects.get(seed).dir().to_path_buf()) {
            return Ok(());
        }
        order.push(seed);

        let mut cursor = order.len() - 1;
        while cursor < order.len() {
            for dep in self.dependencies(order[cursor])? {
                if visited.insert(self.projects.get(dep).dir().to_path_buf()) {
                    order.push(dep);
                }
            }
            cursor += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::options::{CommonFacts, OptionSource};
    use crate::profile::RegistryRule;
    use crate::repository::tests::MockGitOperations;
    use crate::value::OptionValue;
    use serde_json::Value as JsonValue;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_project(root: &Path, dir: &str, declaration: &str) -> PathBuf {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stitch.yaml"), declaration).unwrap();
        dir
    }

    fn loader(root: &Path, registries: &[RegistryRule]) -> Loader {
        let options = ApplicationOption::new(CommonFacts::detect());
        let resolver = LinkResolver::new(
            &root.join("workspace"),
            registries,
            &[],
            options.common().to_json(),
        )
        .unwrap();
        let fetcher = ProjectFetcher::with_operations(Box::new(MockGitOperations::new()), false);
        Loader::new(resolver, fetcher, options)
    }

    fn base_and_app(root: &Path, release: bool) -> PathBuf {
        write_project(
            root,
            "base",
            "name: base\noptions:\n  - name: mode\n    type: string\n    default: dev\n",
        );
        write_project(
            root,
            "app",
            &format!(
                r#"name: app
options:
  - name: release
    type: bool
    default: {}
    assign:
      - project: base
        option: mode
        value: prod
        match: release
dependencies:
  - link: "dir:../base"
"#,
                release
            ),
        )
    }

    #[test]
    fn test_assign_reaches_dependency() {
        let temp = TempDir::new().unwrap();
        let app = base_and_app(temp.path(), true);
        let mut loader = loader(temp.path(), &[]);

        let main = loader.load_link(&ProjectLink::from_dir(&app).unwrap()).unwrap();
        let order = loader.expand_closure(main, Vec::new()).unwrap();
        assert_eq!(order.len(), 2);

        let mode = loader.options().result("base", "mode").unwrap();
        assert_eq!(mode.value, Some(OptionValue::String("prod".to_string())));
        assert_eq!(mode.source, OptionSource::Assign);
    }

    #[test]
    fn test_default_without_release() {
        let temp = TempDir::new().unwrap();
        let app = base_and_app(temp.path(), false);
        let mut loader = loader(temp.path(), &[]);

        let main = loader.load_link(&ProjectLink::from_dir(&app).unwrap()).unwrap();
        loader.expand_closure(main, Vec::new()).unwrap();

        let mode = loader.options().result("base", "mode").unwrap();
        assert_eq!(mode.value, Some(OptionValue::String("dev".to_string())));
        assert_eq!(mode.source, OptionSource::Default);
    }

    #[test]
    fn test_edges_load_lazily() {
        let temp = TempDir::new().unwrap();
        let app = base_and_app(temp.path(), false);
        let mut loader = loader(temp.path(), &[]);

        let setting = loader.load_link(&ProjectLink::from_dir(&app).unwrap()).unwrap();
        let id = loader.load_project(setting).unwrap();
        assert!(loader.projects().by_dir(&temp.path().join("base")).is_none());
        assert!(loader.options().result("base", "mode").is_none());

        let deps = loader.dependencies(id).unwrap();
        assert_eq!(deps.len(), 1);
        assert!(loader.projects().by_dir(&temp.path().join("base")).is_some());
        assert_eq!(loader.dependencies(id).unwrap(), deps);
    }

    #[test]
    fn test_dedup_by_directory_across_link_forms() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_project(root, "base", "name: base\noptions:\n  - name: mode\n    default: dev\n");
        write_project(
            root,
            "tools",
            "name: tools\ndependencies:\n  - link: \"dir:../base\"\n",
        );
        let app = write_project(
            root,
            "app",
            "name: app\ndependencies:\n  - link: \"@local/base\"\n  - link: \"dir:../tools\"\n  - link: \"dir:../base/\"\n  - link: \"dir:.\"\n",
        );
        let registries = vec![RegistryRule {
            name: "local".to_string(),
            link: format!("dir:{}/{{{{ path }}}}", root.display()),
            match_expr: None,
        }];
        let mut loader = loader(root, &registries);

        let main = loader.load_link(&ProjectLink::from_dir(&app).unwrap()).unwrap();
        let app_id = loader.load_project(Rc::clone(&main)).unwrap();
        // Self edge and the second base edge are dropped
        assert_eq!(loader.projects().get(app_id).dependency.edges.len(), 2);

        let order = loader.expand_closure(main, Vec::new()).unwrap();
        let names: Vec<&str> = order
            .iter()
            .map(|id| loader.projects().get(*id).name())
            .collect();
        assert_eq!(names, vec!["app", "base", "tools"]);
        assert_eq!(loader.projects().len(), 3);
        assert_eq!(
            loader.options().results().filter(|(p, _, _)| *p == "base").count(),
            1
        );
    }

    #[test]
    fn test_match_filters_dependencies_and_resources() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_project(root, "extra", "name: extra\n");
        let app = write_project(
            root,
            "app",
            r#"name: app
options:
  - name: with_extra
    type: bool
    default: false
dependencies:
  - link: "dir:../extra"
    match: with_extra
resources:
  - includes: ["*.sh"]
  - includes: ["*.txt"]
    match: "project.name == 'other'"
"#,
        );
        fs::write(app.join("run.sh"), "echo").unwrap();
        fs::write(app.join("notes.txt"), "notes").unwrap();
        let mut loader = loader(root, &[]);

        let main = loader.load_link(&ProjectLink::from_dir(&app).unwrap()).unwrap();
        let order = loader.expand_closure(main, Vec::new()).unwrap();
        assert_eq!(order.len(), 1);
        let targets: Vec<&str> = loader.targets().targets().map(|(t, _)| t).collect();
        assert_eq!(targets, vec!["app/run.sh"]);
    }

    #[test]
    fn test_addition_reuses_options_of_same_name() {
        let temp = TempDir::new().unwrap();
        let app = base_and_app(temp.path(), true);
        let other = write_project(
            temp.path(),
            "other/base",
            "name: base\noptions:\n  - name: mode\n    type: string\n    default: dev\n",
        );
        let mut loader = loader(temp.path(), &[]);

        let main = loader.load_link(&ProjectLink::from_dir(&app).unwrap()).unwrap();
        let addition = loader.load_link(&ProjectLink::from_dir(&other).unwrap()).unwrap();
        let order = loader.expand_closure(main, vec![addition]).unwrap();
        assert_eq!(order.len(), 3);

        let projects = loader.projects();
        let base = projects.get(order[1]);
        let added = projects.get(order[2]);
        assert!(added.addition);
        assert_eq!(added.dir(), other.as_path());
        assert!(Rc::ptr_eq(&base.options, &added.options));
    }

    #[test]
    fn test_addition_already_in_closure() {
        let temp = TempDir::new().unwrap();
        let app = base_and_app(temp.path(), false);
        let mut loader = loader(temp.path(), &[]);

        let main = loader.load_link(&ProjectLink::from_dir(&app).unwrap()).unwrap();
        let addition = loader
            .load_link(&ProjectLink::from_dir(&temp.path().join("base")).unwrap())
            .unwrap();
        let order = loader.expand_closure(main, vec![addition]).unwrap();
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_cycle_terminates() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let alpha = write_project(
            root,
            "alpha",
            "name: alpha\ndependencies:\n  - link: \"dir:../beta\"\n",
        );
        write_project(
            root,
            "beta",
            "name: beta\ndependencies:\n  - link: \"dir:../alpha\"\n",
        );
        let mut loader = loader(root, &[]);

        let main = loader.load_link(&ProjectLink::from_dir(&alpha).unwrap()).unwrap();
        let order = loader.expand_closure(main, Vec::new()).unwrap();
        let names: Vec<&str> = order
            .iter()
            .map(|id| loader.projects().get(*id).name())
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        // beta's edge back to alpha points at the first project
        let beta = loader.projects().by_name("beta").unwrap();
        assert_eq!(loader.dependencies(beta).unwrap(), vec![order[0]]);
    }

    #[test]
    fn test_git_dependency_is_fetched_once() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let workspace = root.join("workspace");
        let checkout = workspace.join("git/example.com/org/lib/tag/v1");
        fs::create_dir_all(&checkout).unwrap();
        fs::write(checkout.join("stitch.yaml"), "name: lib\n").unwrap();
        // Reached from app directly and again through tools
        let lib_link = "git:https://example.com/org/lib.git#ref=tag/v1";
        write_project(
            root,
            "tools",
            &format!("name: tools\ndependencies:\n  - link: \"{}\"\n", lib_link),
        );
        let app = write_project(
            root,
            "app",
            &format!(
                "name: app\ndependencies:\n  - link: \"{}\"\n  - link: \"dir:../tools\"\n",
                lib_link
            ),
        );

        let git_ops = MockGitOperations::new();
        let calls = git_ops.calls.clone();
        let options = ApplicationOption::new(CommonFacts::detect());
        let resolver = LinkResolver::new(&workspace, &[], &[], JsonValue::Null).unwrap();
        let fetcher = ProjectFetcher::with_operations(Box::new(git_ops), false);
        let mut loader = Loader::new(resolver, fetcher, options);

        let main = loader.load_link(&ProjectLink::from_dir(&app).unwrap()).unwrap();
        let order = loader.expand_closure(main, Vec::new()).unwrap();
        assert_eq!(order.len(), 3);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, checkout);
    }

    #[test]
    fn test_errors_name_the_project() {
        let temp = TempDir::new().unwrap();
        let app = write_project(
            temp.path(),
            "app",
            "name: app\noptions:\n  - name: required\n",
        );
        let mut loader = loader(temp.path(), &[]);

        let main = loader.load_link(&ProjectLink::from_dir(&app).unwrap()).unwrap();
        let err = loader.expand_closure(main, Vec::new()).unwrap_err();
        assert!(err.to_string().contains("project=app"));
        assert!(matches!(err.root_cause(), Error::OptionEmpty { .. }));
    }

    #[test]
    fn test_missing_dependency_is_an_error() {
        let temp = TempDir::new().unwrap();
        let app = write_project(
            temp.path(),
            "app",
            "name: app\ndependencies:\n  - link: \"dir:../missing\"\n",
        );
        let mut loader = loader(temp.path(), &[]);

        let main = loader.load_link(&ProjectLink::from_dir(&app).unwrap()).unwrap();
        let err = loader.expand_closure(main, Vec::new()).unwrap_err();
        assert!(matches!(err.root_cause(), Error::NotFound { .. }));
    }
}
