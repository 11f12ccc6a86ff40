use std::fs;
use std::path::Path;
use std::process::Command;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::link::GitRef;

/// Clone a repository at a specific ref using a shallow, single-branch clone
///
/// This uses the system git command, which automatically handles:
/// - SSH keys from ~/.ssh/
/// - Git credential helpers
/// - Personal access tokens
/// - Any authentication configured in ~/.gitconfig
pub fn clone_shallow(url: &str, r#ref: &GitRef, target_dir: &Path) -> Result<()> {
    // git won't clone into an existing non-empty dir
    if target_dir.exists() {
        fs::remove_dir_all(target_dir)?;
    }

    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    info!("cloning {} at {} into {}", url, r#ref, target_dir.display());
    let output = Command::new("git")
        .args([
            "clone",
            "--depth=1",
            "--single-branch",
            "--branch",
            &r#ref.name,
            url,
        ])
        .arg(target_dir)
        .output()
        .map_err(|e| Error::GitClone {
            url: url.to_string(),
            r#ref: r#ref.to_string(),
            message: e.to_string(),
            hint: Some("Make sure git is installed and on PATH".to_string()),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);

        let hint = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            Some(
                "Make sure you have access to the repository (ssh-agent key, credential helper or access token)"
                    .to_string(),
            )
        } else if stderr.contains("not found in upstream") {
            Some(format!(
                "The {} '{}' does not exist in the remote repository",
                r#ref.kind.as_str(),
                r#ref.name
            ))
        } else {
            None
        };

        return Err(Error::GitClone {
            url: url.to_string(),
            r#ref: r#ref.to_string(),
            message: stderr.trim().to_string(),
            hint,
        });
    }

    Ok(())
}

/// Bring an existing checkout to the tip of `ref`, discarding local changes.
pub fn update_checkout(url: &str, r#ref: &GitRef, dir: &Path) -> Result<()> {
    info!("updating {} at {} in {}", url, r#ref, dir.display());

    let fetch_ref = match r#ref.kind {
        crate::link::RefKind::Branch => r#ref.name.clone(),
        crate::link::RefKind::Tag => format!("refs/tags/{}", r#ref.name),
    };

    run_git(dir, url, &["fetch", "--depth=1", "origin", &fetch_ref])?;
    run_git(dir, url, &["reset", "--hard", "FETCH_HEAD"])?;
    run_git(dir, url, &["clean", "-fdx"])?;
    Ok(())
}

/// Download a project checkout: clone when absent, otherwise update in place.
pub fn download_project(dir: &Path, url: &str, r#ref: &GitRef) -> Result<()> {
    if dir.join(".git").is_dir() {
        update_checkout(url, r#ref, dir)
    } else {
        clone_shallow(url, r#ref, dir)
    }
}

fn run_git(dir: &Path, url: &str, args: &[&str]) -> Result<()> {
    debug!("git {} (in {})", args.join(" "), dir.display());
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            url: url.to_string(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command: args.join(" "),
            url: url.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clone_missing_repository_fails() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("checkout");
        let missing = temp_dir.path().join("no-such-repo");
        let url = format!("file://{}", missing.display());

        let err = clone_shallow(&url, &GitRef::default(), &target).unwrap_err();
        assert!(matches!(err, Error::GitClone { .. }));
    }

    #[test]
    fn test_update_outside_repository_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = update_checkout("file:///nowhere", &GitRef::tag("v1"), temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::GitCommand { .. } | Error::GitClone { .. }));
    }

    #[cfg(feature = "integration-tests")]
    #[test]
    fn test_download_project_clone_then_update() {
        let temp_dir = TempDir::new().unwrap();
        let origin = temp_dir.path().join("origin");
        fs::create_dir_all(&origin).unwrap();
        let git = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(&origin)
                .status()
                .unwrap();
            assert!(status.success());
        };
        git(&["init", "-b", "main"]);
        git(&["config", "user.email", "dev@example.com"]);
        git(&["config", "user.name", "dev"]);
        fs::write(origin.join("stitch.yaml"), "name: remote\n").unwrap();
        git(&["add", "."]);
        git(&["commit", "-m", "init"]);

        let url = format!("file://{}", origin.display());
        let checkout = temp_dir.path().join("checkout");
        download_project(&checkout, &url, &GitRef::default()).unwrap();
        assert!(checkout.join("stitch.yaml").is_file());

        fs::write(checkout.join("scratch.txt"), "local").unwrap();
        download_project(&checkout, &url, &GitRef::default()).unwrap();
        assert!(!checkout.join("scratch.txt").exists());
    }
}
