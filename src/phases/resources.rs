//! Resource scanning and output target naming
//!
//! Each resource declaration of a project names a directory to scan plus
//! include/exclude globs. Every matched file is classified by name:
//!
//! | Kind | File name | Output |
//! |---|---|---|
//! | config | `*.config.{yaml,yml,toml,json}` | merged, never emitted |
//! | template library | `*.lib.tera` | registered as `project/relpath`, never emitted |
//! | template | `*.tera` | `project/relpath` without `.tera` |
//! | plain | anything else | `project/relpath` |
//!
//! `relpath` is relative to the declaration's directory. Output targets are
//! checked for collisions across the whole project set with a
//! [`TargetIndex`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::merge::ConfigFragment;
use crate::path::{compile_glob, glob_matches, normalize_lexically, to_slash};
use crate::setting::ResourceDeclaration;
use crate::structured::STRUCTURED_EXTENSIONS;

/// Suffix marking a template.
pub const TEMPLATE_SUFFIX: &str = ".tera";

/// Suffix marking a template library.
pub const LIBRARY_SUFFIX: &str = ".lib.tera";

/// Classification of a resource file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Config,
    TemplateLibrary,
    Template,
    Plain,
}

/// Classify a file by its name.
pub fn classify(file_name: &str) -> ResourceKind {
    let is_config = STRUCTURED_EXTENSIONS
        .iter()
        .any(|ext| file_name.ends_with(&format!(".config.{}", ext)));

    if is_config {
        ResourceKind::Config
    } else if file_name.ends_with(LIBRARY_SUFFIX) {
        ResourceKind::TemplateLibrary
    } else if file_name.ends_with(TEMPLATE_SUFFIX) {
        ResourceKind::Template
    } else {
        ResourceKind::Plain
    }
}

/// One scanned file that produces or feeds output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFile {
    /// Absolute source path.
    pub source: PathBuf,
    /// `project/relpath` (template suffix stripped for templates).
    pub target: String,
}

/// Classified resources of one project.
#[derive(Debug, Clone, Default)]
pub struct Resource {
    pub configs: Vec<ConfigFragment>,
    pub libraries: Vec<ResourceFile>,
    pub templates: Vec<ResourceFile>,
    pub plains: Vec<ResourceFile>,
}

impl Resource {
    /// Targets this project writes to the output.
    pub fn emitted(&self) -> impl Iterator<Item = &ResourceFile> {
        self.templates.iter().chain(self.plains.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
            && self.libraries.is_empty()
            && self.templates.is_empty()
            && self.plains.is_empty()
    }
}

/// Scan the given declarations of one project.
///
/// `skip` is the project's own declaration file, which is never a resource.
pub fn scan(
    project: &str,
    project_dir: &Path,
    skip: &Path,
    declarations: &[&ResourceDeclaration],
) -> Result<Resource> {
    let mut resource = Resource::default();
    let mut seen_configs = HashSet::new();
    let mut seen_libraries = HashSet::new();
    let mut seen_targets = HashSet::new();

    for declaration in declarations {
        let root = normalize_lexically(&project_dir.join(&declaration.dir));
        if !root.starts_with(project_dir) {
            return Err(Error::SettingParse {
                path: skip.to_path_buf(),
                message: format!("resource dir '{}' escapes the project", declaration.dir),
                hint: None,
            });
        }
        if !root.is_dir() {
            return Err(Error::NotFound {
                what: format!("resource dir '{}'", declaration.dir),
                dir: project_dir.to_path_buf(),
            });
        }

        let includes = declaration
            .includes
            .iter()
            .map(|pattern| compile_glob(pattern))
            .collect::<Result<Vec<_>>>()?;
        let excludes = declaration
            .excludes
            .iter()
            .map(|pattern| compile_glob(pattern))
            .collect::<Result<Vec<_>>>()?;

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != ".git");

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || entry.path() == skip {
                continue;
            }

            let relative = match entry.path().strip_prefix(&root) {
                Ok(relative) => to_slash(relative),
                Err(_) => continue,
            };
            if !includes.iter().any(|pattern| glob_matches(pattern, &relative))
                || excludes.iter().any(|pattern| glob_matches(pattern, &relative))
            {
                continue;
            }

            let source = entry.path().to_path_buf();
            let file_name = entry.file_name().to_string_lossy();
            let target = format!("{}/{}", project, relative);

            match classify(&file_name) {
                ResourceKind::Config => {
                    if seen_configs.insert(source.clone()) {
                        resource.configs.push(ConfigFragment::new(source));
                    }
                }
                ResourceKind::TemplateLibrary => {
                    if seen_libraries.insert(source.clone()) {
                        resource.libraries.push(ResourceFile { source, target });
                    }
                }
                ResourceKind::Template => {
                    let target = target
                        .strip_suffix(TEMPLATE_SUFFIX)
                        .unwrap_or(&target)
                        .to_string();
                    if seen_targets.insert((source.clone(), target.clone())) {
                        resource.templates.push(ResourceFile { source, target });
                    }
                }
                ResourceKind::Plain => {
                    if seen_targets.insert((source.clone(), target.clone())) {
                        resource.plains.push(ResourceFile { source, target });
                    }
                }
            }
        }
    }

    debug!(
        "scanned {}: {} configs, {} libraries, {} templates, {} plain files",
        project,
        resource.configs.len(),
        resource.libraries.len(),
        resource.templates.len(),
        resource.plains.len()
    );
    Ok(resource)
}

/// Output targets claimed across the whole project set.
#[derive(Debug, Clone, Default)]
pub struct TargetIndex {
    targets: BTreeMap<String, PathBuf>,
}

impl TargetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `target` for `source`. The same source claiming it again is
    /// fine; a different source is a collision.
    pub fn register(&mut self, target: &str, source: &Path) -> Result<()> {
        match self.targets.get(target) {
            Some(existing) if existing == source => {
                warn!("target {} rediscovered from {}", target, source.display());
                Ok(())
            }
            Some(existing) => Err(Error::TargetCollision {
                target: target.to_string(),
                first: existing.clone(),
                second: source.to_path_buf(),
            }),
            None => {
                self.targets.insert(target.to_string(), source.to_path_buf());
                Ok(())
            }
        }
    }

    /// Claim every emitted target of `resource`.
    pub fn register_all(&mut self, resource: &Resource) -> Result<()> {
        for file in resource.emitted() {
            self.register(&file.target, &file.source)?;
        }
        Ok(())
    }

    /// Claimed targets, sorted.
    pub fn targets(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.targets
            .iter()
            .map(|(target, source)| (target.as_str(), source.as_path()))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
