//! Phase 3: Writing the artifact
//!
//! Materializes a [`Composition`] into an output directory:
//!
//! 1.  **Register templates**: every template library and template of the
//!     closure is added to one `tera` instance, libraries under
//!     `project/relpath` and templates under `project/relpath.tera`, so
//!     templates can import libraries of any loaded project.
//! 2.  **Render templates**: each template renders with its project's
//!     context (merged config, common facts, options) and keeps its source's
//!     permissions.
//! 3.  **Link plain files**: plain files are hard-linked into place, falling
//!     back to a copy across filesystems.
//! 4.  **Metadata**: the merged config and its trace are written under
//!     `.stitch/`.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tera::{Context, Tera};

use super::orchestrator::Composition;
use crate::defaults::METADATA_DIR;
use crate::error::{Error, ErrorContext, Result, ResultExt};
use crate::evaluator::template_error;

/// Merged config, relative to the metadata dir.
pub const CONFIG_FILE: &str = "config.json";

/// Merge trace, relative to the metadata dir.
pub const TRACE_FILE: &str = "trace.json";

/// Resolved options, relative to the metadata dir.
pub const OPTIONS_FILE: &str = "options.json";

fn template_name(target: &str) -> String {
    format!("{}.tera", target)
}

/// Write `composition` into `output`. Returns the written targets.
pub fn materialize(composition: &Composition, output: &Path) -> Result<Vec<PathBuf>> {
    let mut tera = Tera::default();
    tera.autoescape_on(Vec::new());

    let mut sources = Vec::new();
    for project in composition.loaded() {
        for library in &project.resource.libraries {
            sources.push((library.target.clone(), fs::read_to_string(&library.source)?));
        }
        for template in &project.resource.templates {
            sources.push((template_name(&template.target), fs::read_to_string(&template.source)?));
        }
    }
    tera.add_raw_templates(sources)
        .map_err(|err| template_error("template registration", &err))?;

    fs::create_dir_all(output)?;
    let mut written = Vec::new();

    for project in composition.loaded() {
        let context = Context::from_value(composition.render_context(project).to_value())
            .map_err(|err| template_error(project.name(), &err))?;

        for template in &project.resource.templates {
            let name = template_name(&template.target);
            let rendered = tera
                .render(&name, &context)
                .map_err(|err| template_error(&name, &err))?;
            let path = prepare(output, &template.target)?;
            fs::write(&path, rendered)
                .map_err(Error::from)
                .with_context(|| ErrorContext::new().with("target", &template.target))?;
            fs::set_permissions(&path, fs::metadata(&template.source)?.permissions())?;
            debug!("rendered {}", template.target);
            written.push(path);
        }

        for plain in &project.resource.plains {
            let path = prepare(output, &plain.target)?;
            link_or_copy(&plain.source, &path)
                .with_context(|| ErrorContext::new().with("target", &plain.target))?;
            debug!("linked {}", plain.target);
            written.push(path);
        }
    }

    write_metadata(composition, output)?;
    info!("wrote {} files to {}", written.len(), output.display());
    Ok(written)
}

/// Create the parent of `target` and clear any file already there.
fn prepare(output: &Path, target: &str) -> Result<PathBuf> {
    let path = output.join(target);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if path.symlink_metadata().is_ok() {
        fs::remove_file(&path)?;
    }
    Ok(path)
}

fn link_or_copy(source: &Path, dest: &Path) -> Result<()> {
    if let Err(err) = fs::hard_link(source, dest) {
        debug!(
            "hard link {} failed ({}), copying",
            source.display(),
            err
        );
        fs::copy(source, dest)?;
    }
    Ok(())
}

fn write_metadata(composition: &Composition, output: &Path) -> Result<()> {
    let dir = output.join(METADATA_DIR);
    fs::create_dir_all(&dir)?;

    let options: Vec<_> = composition
        .options
        .results()
        .map(|(project, option, item)| {
            serde_json::json!({
                "project": project,
                "option": option,
                "value": item.value.as_ref().map(|value| value.to_json()),
                "source": item.source,
            })
        })
        .collect();

    for (file, value) in [
        (CONFIG_FILE, &composition.merged.value),
        (TRACE_FILE, &composition.merged.trace),
        (OPTIONS_FILE, &serde_json::Value::Array(options)),
    ] {
        let content = serde_json::to_string_pretty(value).map_err(|err| Error::StructuredParse {
            path: dir.join(file),
            message: err.to_string(),
        })?;
        fs::write(dir.join(file), content + "\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ApplicationOption, CommonFacts};
    use crate::phases::discovery::Loader;
    use crate::phases::orchestrator::compose_with;
    use crate::profile::Profile;
    use crate::repository::tests::MockGitOperations;
    use crate::repository::ProjectFetcher;
    use crate::resolver::LinkResolver;
    use serde_json::Value as JsonValue;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn compose_fixture(root: &Path) -> Composition {
        let base = root.join("base");
        fs::create_dir_all(base.join("lib")).unwrap();
        fs::write(
            base.join("stitch.yaml"),
            "name: base\noptions:\n  - name: mode\n    default: dev\nresources:\n  - {}\n",
        )
        .unwrap();
        fs::write(base.join("base.config.yaml"), "server:\n  port: 80\n").unwrap();
        fs::write(
            base.join("lib/macros.lib.tera"),
            "{% macro greet(who) %}hello {{ who }}{% endmacro greet %}",
        )
        .unwrap();

        let app = root.join("app");
        fs::create_dir_all(&app).unwrap();
        fs::write(
            app.join("stitch.yaml"),
            "name: app\ndependencies:\n  - link: \"dir:../base\"\nresources:\n  - {}\n",
        )
        .unwrap();
        fs::write(app.join("app.config.yaml"), "$order: 1\nserver:\n  host: example\n").unwrap();
        fs::write(
            app.join("run.sh.tera"),
            "{% import \"base/lib/macros.lib.tera\" as m %}{{ m::greet(who=project.name) }} {{ server.host }}:{{ config.server.port }} {{ options.base.mode }}\n",
        )
        .unwrap();
        fs::set_permissions(app.join("run.sh.tera"), fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(app.join("README"), "plain").unwrap();

        let mut profile = Profile::new(root);
        profile.project = Some("dir:app".to_string());

        let options = ApplicationOption::new(CommonFacts::detect());
        let resolver =
            LinkResolver::new(&root.join("workspace"), &[], &[], JsonValue::Null).unwrap();
        let fetcher = ProjectFetcher::with_operations(Box::new(MockGitOperations::new()), false);
        compose_with(Loader::new(resolver, fetcher, options), &profile).unwrap()
    }

    #[test]
    fn test_materialize_renders_and_links() {
        let temp = TempDir::new().unwrap();
        let composition = compose_fixture(temp.path());
        let output = temp.path().join("out");

        let written = materialize(&composition, &output).unwrap();
        assert_eq!(written.len(), 2);

        let script = output.join("app/run.sh");
        assert_eq!(
            fs::read_to_string(&script).unwrap(),
            "hello app example:80 dev\n"
        );
        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
        assert_eq!(fs::read_to_string(output.join("app/README")).unwrap(), "plain");
        assert!(!output.join("base/lib/macros.lib.tera").exists());
        assert!(!output.join("app/app.config.yaml").exists());
    }

    #[test]
    fn test_materialize_writes_metadata() {
        let temp = TempDir::new().unwrap();
        let composition = compose_fixture(temp.path());
        let output = temp.path().join("out");
        materialize(&composition, &output).unwrap();

        let config: JsonValue = serde_json::from_str(
            &fs::read_to_string(output.join(".stitch/config.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(config["server"]["port"], 80);
        assert_eq!(config["server"]["host"], "example");

        let trace: JsonValue = serde_json::from_str(
            &fs::read_to_string(output.join(".stitch/trace.json")).unwrap(),
        )
        .unwrap();
        assert!(trace["server"]["host"]
            .as_str()
            .unwrap()
            .ends_with("app.config.yaml"));
    }

    #[test]
    fn test_materialize_twice_replaces_files() {
        let temp = TempDir::new().unwrap();
        let composition = compose_fixture(temp.path());
        let output = temp.path().join("out");
        materialize(&composition, &output).unwrap();
        materialize(&composition, &output).unwrap();
        assert!(output.join("app/run.sh").is_file());
    }
}
