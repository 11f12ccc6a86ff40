//! # Git Checkout Management
//!
//! This module provides the `ProjectFetcher`, the interface the loader uses
//! to make sure a git-hosted project is present on disk before its
//! declaration is read.
//!
//! ## Design
//!
//! The fetcher is built around the `GitOperations` trait, which separates
//! the bookkeeping (download each checkout at most once per run, honour
//! offline mode) from the concrete `git` invocations. In the main
//! application `DefaultGitOperations` wraps the system `git` binary via
//! [`crate::git`]. In tests it is replaced with a mock that records calls
//! without touching the network.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{Error, Result};
use crate::link::GitRef;
use crate::resolver::GitSpec;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Make `dir` a checkout of `url` at `ref`: clone when absent, otherwise
    /// hard-reset, clean and pull. Shallow and single-branch either way.
    fn download_project(&self, dir: &Path, url: &str, r#ref: &GitRef) -> Result<()>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command.
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn download_project(&self, dir: &Path, url: &str, r#ref: &GitRef) -> Result<()> {
        crate::git::download_project(dir, url, r#ref)
    }
}

/// Downloads git checkouts on behalf of the loader.
pub struct ProjectFetcher {
    git_ops: Box<dyn GitOperations>,
    offline: bool,
    fetched: HashSet<PathBuf>,
}

impl ProjectFetcher {
    /// Creates a fetcher backed by the system `git` binary.
    pub fn new(offline: bool) -> Self {
        Self::with_operations(Box::new(DefaultGitOperations), offline)
    }

    /// Creates a fetcher with a custom `GitOperations` implementation.
    pub fn with_operations(git_ops: Box<dyn GitOperations>, offline: bool) -> Self {
        Self {
            git_ops,
            offline,
            fetched: HashSet::new(),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Ensure the checkout described by `spec` is on disk.
    ///
    /// Each checkout directory is downloaded at most once per fetcher. In
    /// offline mode nothing is downloaded: an existing checkout is used as
    /// is and a missing one is an error.
    pub fn fetch(&mut self, spec: &GitSpec) -> Result<()> {
        if self.fetched.contains(&spec.checkout) {
            debug!("checkout {} already fetched", spec.checkout.display());
            return Ok(());
        }

        if self.offline {
            if !spec.checkout.is_dir() {
                return Err(Error::GitClone {
                    url: spec.url.to_string(),
                    r#ref: spec.r#ref.to_string(),
                    message: format!("no checkout at {}", spec.checkout.display()),
                    hint: Some("Run once without --offline to download it".to_string()),
                });
            }
            debug!("offline: using checkout {}", spec.checkout.display());
        } else {
            info!("fetching {} at {}", spec.url, spec.r#ref);
            self.git_ops
                .download_project(&spec.checkout, spec.url.as_str(), &spec.r#ref)?;
        }

        self.fetched.insert(spec.checkout.clone());
        Ok(())
    }

    /// Whether the checkout at `dir` was handled during this run.
    pub fn is_fetched(&self, dir: &Path) -> bool {
        self.fetched.contains(dir)
    }
}
