//! Loaded projects and the arena that owns them
//!
//! Every project of a run lives in one [`ProjectSet`]. Dependency edges refer
//! to their targets by [`ProjectId`], so the graph can contain cycles without
//! any shared ownership between projects.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::link::ProjectLink;
use crate::options::ProjectOptions;
use crate::phases::resources::Resource;
use crate::resolver::ProjectLinkTarget;
use crate::setting::ProjectSetting;

/// Index of a project inside its [`ProjectSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub usize);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One dependency edge after match filtering and link resolution.
#[derive(Debug, Clone)]
pub struct DependencyEdge {
    /// The link as declared (relative `dir:` paths already made absolute).
    pub link: ProjectLink,
    pub target: ProjectLinkTarget,
    /// Filled in when the edge is first traversed.
    pub project: Option<ProjectId>,
}

/// Outgoing edges of a project.
#[derive(Debug, Clone, Default)]
pub struct Dependency {
    pub edges: Vec<DependencyEdge>,
    /// Whether every edge target has been loaded.
    pub loaded: bool,
}

impl Dependency {
    /// Loaded edge targets, in declaration order.
    pub fn projects(&self) -> impl Iterator<Item = ProjectId> + '_ {
        self.edges.iter().filter_map(|edge| edge.project)
    }
}

/// A loaded project: its declaration, resolved options, edges and resources.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: ProjectId,
    pub setting: Rc<ProjectSetting>,
    /// Shared with any addition that reuses this project's name.
    pub options: Rc<ProjectOptions>,
    pub dependency: Dependency,
    pub resource: Resource,
    /// Injected by the profile rather than reached through an edge.
    pub addition: bool,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.setting.name
    }

    pub fn dir(&self) -> &Path {
        &self.setting.dir
    }
}

/// Arena of loaded projects, indexed by directory and by name.
#[derive(Debug, Default)]
pub struct ProjectSet {
    projects: Vec<Project>,
    by_dir: HashMap<PathBuf, ProjectId>,
    by_name: HashMap<String, ProjectId>,
}

impl ProjectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a project and assign its id.
    ///
    /// The name index keeps the first project registered under a name.
    pub fn insert(&mut self, mut project: Project) -> ProjectId {
        let id = ProjectId(self.projects.len());
        project.id = id;
        self.by_dir.insert(project.dir().to_path_buf(), id);
        self.by_name.entry(project.name().to_string()).or_insert(id);
        self.projects.push(project);
        id
    }

    pub fn get(&self, id: ProjectId) -> &Project {
        &self.projects[id.0]
    }

    pub fn get_mut(&mut self, id: ProjectId) -> &mut Project {
        &mut self.projects[id.0]
    }

    pub fn by_dir(&self, dir: &Path) -> Option<ProjectId> {
        self.by_dir.get(dir).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<ProjectId> {
        self.by_name.get(name).copied()
    }

    /// Projects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
