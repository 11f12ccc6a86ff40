//! Default values for stitch configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// File name of the profile looked up in the current directory.
pub const DEFAULT_PROFILE_FILE: &str = "stitch-profile.yaml";

/// Output directory used by `stitch build` when `-o` is not given.
pub const DEFAULT_OUTPUT_DIR: &str = "stitch-out";

/// Directory inside the output that holds the merged config and trace.
pub const METADATA_DIR: &str = ".stitch";

/// Returns the default workspace directory (root of git checkouts).
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/stitch` (XDG Base Directory)
/// - macOS: `~/Library/Caches/stitch`
/// - Windows: `{FOLDERID_LocalAppData}\stitch`
///
/// Falls back to `.stitch-workspace` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the profile's `workspace` key, the
/// `--workspace` CLI flag or the `STITCH_WORKSPACE` environment variable.
pub fn default_workspace() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("stitch"))
        .unwrap_or_else(|| PathBuf::from(".stitch-workspace"))
}
