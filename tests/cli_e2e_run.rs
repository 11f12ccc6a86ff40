//! End-to-end tests for the `run` command.
//!
//! These launch real processes through `sh`.

mod common;
use common::prelude::*;

#[test]
fn test_run_help() {
    TestFixture::new()
        .command()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--executor"));
}

#[test]
fn test_run_selects_main_target() {
    let fixture = TestFixture::new().with_base_and_app(true);

    fixture
        .command()
        .args(["run", "--executor", "sh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app prod app.local:80"));
}

#[test]
fn test_run_passes_exit_code_and_args() {
    let fixture = TestFixture::new()
        .with_project("tool", "name: tool\nresources:\n  - {}\n")
        .with_file("tool/main.sh", "echo \"got $1\"\nexit 3\n")
        .with_profile("project: \"dir:tool\"\n");

    fixture
        .command()
        .args(["run", "--executor", "sh", "--target", "main.sh", "--", "hello"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("got hello"));
}

#[test]
fn test_run_keeps_output_when_requested() {
    let fixture = TestFixture::new().with_base_and_app(false);

    fixture
        .command()
        .args(["run", "--executor", "sh", "--output", "kept"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app dev"));

    fixture
        .child("kept/app/run.sh")
        .assert(predicate::path::exists());
}

#[test]
fn test_run_custom_executor_from_profile() {
    let fixture = TestFixture::new()
        .with_project("notes", "name: notes\nresources:\n  - {}\n")
        .with_file("notes/readme.txt", "plain notes\n")
        .with_profile(
            "project: \"dir:notes\"\nexecutors:\n  - name: cat\n    bin: cat\n    extensions: [\".txt\"]\n",
        );

    fixture
        .command()
        .args(["run", "--executor", "cat"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plain notes"));
}

#[test]
fn test_run_unknown_target_fails() {
    let fixture = TestFixture::new().with_base_and_app(false);

    fixture
        .command()
        .args(["run", "--executor", "sh", "--target", "missing.sh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown target 'missing.sh'"));
}

#[test]
fn test_run_unknown_executor_fails() {
    let fixture = TestFixture::new().with_base_and_app(false);

    fixture
        .command()
        .args(["run", "--executor", "python"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("known executors"));
}
