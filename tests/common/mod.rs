//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_base_and_app(true);
//!     fixture.command().arg("options").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::projects;
    pub use super::TestFixture;
}

/// Project declarations used across tests.
#[allow(dead_code)]
pub mod projects {
    /// `base`: one string option `mode` defaulting to `dev`, and its files.
    pub const BASE: &str = r#"
name: base
options:
  - name: mode
    type: string
    default: dev
    choices: [dev, prod]
resources:
  - {}
"#;

    /// `app`: depends on `base` and assigns `base.mode = prod` when released.
    pub fn app(release: bool) -> String {
        format!(
            r#"
name: app
options:
  - name: release
    type: bool
    default: {release}
    assign:
      - project: base
        option: mode
        value: prod
        match: release
dependencies:
  - link: "dir:../base"
resources:
  - {{}}
"#
        )
    }

    pub const BASE_CONFIG: &str = "server:\n  port: 80\n  tags: [base]\n";

    pub const APP_CONFIG: &str = "$order: 1\nserver:\n  host: app.local\n  tags: [app]\n";

    pub const RUN_TEMPLATE: &str =
        "#!/bin/sh\necho \"{{ project.name }} {{ options.base.mode }} {{ server.host }}:{{ server.port }}\"\n";
}

/// A temporary directory laid out as a set of projects plus a profile.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a project directory holding `stitch.yaml` with `declaration`.
    pub fn with_project(self, dir: &str, declaration: &str) -> Self {
        self.with_file(&format!("{}/stitch.yaml", dir), declaration)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Add `stitch-profile.yaml` with the given content.
    pub fn with_profile(self, content: &str) -> Self {
        self.with_file("stitch-profile.yaml", content)
    }

    /// The `base`/`app` pair with configs, a template and a plain file, and
    /// a profile pointing at `app`.
    pub fn with_base_and_app(self, release: bool) -> Self {
        self.with_project("base", projects::BASE)
            .with_file("base/base.config.yaml", projects::BASE_CONFIG)
            .with_file("base/lib/common.sh", "log() { echo \"$@\"; }\n")
            .with_project("app", &projects::app(release))
            .with_file("app/app.config.yaml", projects::APP_CONFIG)
            .with_file("app/run.sh.tera", projects::RUN_TEMPLATE)
            .with_profile("project: \"dir:app\"\n")
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, path: &str) -> PathBuf {
        self.temp_dir.path().join(path)
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture {
    /// A `stitch` command running in this fixture with an isolated workspace.
    #[allow(dead_code)]
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("stitch");
        cmd.current_dir(self.path())
            .env("STITCH_WORKSPACE", self.path().join("workspace"))
            .env_remove("STITCH_PROFILE")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}
