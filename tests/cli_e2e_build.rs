//! End-to-end tests for the `build` command.

mod common;
use common::prelude::*;

#[test]
fn test_build_help() {
    let fixture = TestFixture::new();
    fixture
        .command()
        .arg("build")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Compose the project graph and write the artifact",
        ));
}

#[test]
fn test_build_writes_artifact() {
    let fixture = TestFixture::new().with_base_and_app(true);

    fixture
        .command()
        .arg("build")
        .arg("--output")
        .arg("out")
        .assert()
        .success()
        .stdout(predicate::str::contains("Composed 2 projects"));

    fixture
        .child("out/app/run.sh")
        .assert(predicate::str::contains("app prod app.local:80"));
    fixture
        .child("out/base/lib/common.sh")
        .assert(predicate::path::exists());
    fixture
        .child("out/base/base.config.yaml")
        .assert(predicate::path::missing());
    fixture
        .child("out/.stitch/config.json")
        .assert(predicate::str::contains("app.local"));
    fixture
        .child("out/.stitch/trace.json")
        .assert(predicate::str::contains("app.config.yaml"));
}

#[test]
fn test_build_default_output_dir() {
    let fixture = TestFixture::new().with_base_and_app(false);

    fixture.command().arg("build").arg("--quiet").assert().success();

    fixture
        .child("stitch-out/app/run.sh")
        .assert(predicate::str::contains("app dev app.local:80"));
}

#[test]
fn test_build_dry_run_lists_targets() {
    let fixture = TestFixture::new().with_base_and_app(true);

    fixture
        .command()
        .args(["build", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app/run.sh"))
        .stdout(predicate::str::contains("base/lib/common.sh"));

    fixture.child("stitch-out").assert(predicate::path::missing());
}

#[test]
fn test_build_set_override_conflicts_with_assign() {
    let fixture = TestFixture::new().with_base_and_app(true);

    fixture
        .command()
        .args(["build", "--dry-run", "--set", "base.mode=dev"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate assign to base.mode"));
}

#[test]
fn test_build_without_project_fails_with_hint() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no main project given"))
        .stderr(predicate::str::contains("--project"));
}

#[test]
fn test_build_project_flag_without_profile() {
    let fixture = TestFixture::new()
        .with_project("solo", "name: solo\nresources:\n  - {}\n")
        .with_file("solo/hello.txt", "hi\n");

    fixture
        .command()
        .args(["build", "--project", "dir:solo", "--output", "out"])
        .assert()
        .success();

    fixture.child("out/solo/hello.txt").assert("hi\n");
}

#[test]
fn test_build_target_collision_fails() {
    // Two directories declaring `app` both emit app/run.sh
    let fixture = TestFixture::new()
        .with_project("one/app", "name: app\nresources:\n  - {}\n")
        .with_file("one/app/run.sh", "echo one\n")
        .with_project("two/app", "name: app\nresources:\n  - {}\n")
        .with_file("two/app/run.sh", "echo two\n")
        .with_profile("project: \"dir:one/app\"\nadditions: [\"dir:two/app\"]\n");

    fixture
        .command()
        .args(["build", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Target collision at 'app/run.sh'"));
}

#[test]
fn test_build_same_source_twice_is_fine() {
    let fixture = TestFixture::new()
        .with_base_and_app(false)
        .with_profile("project: \"dir:app\"\nadditions: [\"dir:base\"]\n");

    fixture
        .command()
        .args(["build", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Composed 2 projects"));
}
