//! In-process caching of loaded project declarations

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, warn};

use crate::error::Result;
use crate::setting::ProjectSetting;

/// Declarations loaded during one run, keyed by directory and by name.
///
/// Each directory is read at most once. A name declared from two
/// directories is reported once with both of them.
#[derive(Debug, Default)]
pub struct SettingCache {
    by_dir: HashMap<PathBuf, Rc<ProjectSetting>>,
    by_name: HashMap<String, PathBuf>,
}

impl SettingCache {
    /// Create a new empty setting cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached declaration, or load and cache it if not present
    pub fn get_or_load<F>(&mut self, dir: &Path, loader: F) -> Result<Rc<ProjectSetting>>
    where
        F: FnOnce() -> Result<ProjectSetting>,
    {
        if let Some(cached) = self.by_dir.get(dir) {
            return Ok(Rc::clone(cached));
        }

        let setting = Rc::new(loader()?);
        debug!("loaded setting {} from {}", setting.name, dir.display());
        self.insert(dir, Rc::clone(&setting));
        Ok(setting)
    }

    /// Load the declaration in `dir` through the cache
    pub fn load(&mut self, dir: &Path) -> Result<Rc<ProjectSetting>> {
        self.get_or_load(dir, || ProjectSetting::load(dir))
    }

    fn insert(&mut self, dir: &Path, setting: Rc<ProjectSetting>) {
        match self.by_name.get(&setting.name) {
            Some(existing) if existing != dir => warn!(
                "project name '{}' is declared in both {} and {}",
                setting.name,
                existing.display(),
                dir.display()
            ),
            Some(_) => {}
            None => {
                self.by_name.insert(setting.name.clone(), dir.to_path_buf());
            }
        }
        self.by_dir.insert(dir.to_path_buf(), setting);
    }

    /// Get the number of cached declarations
    pub fn len(&self) -> usize {
        self.by_dir.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.by_dir.is_empty()
    }
}
