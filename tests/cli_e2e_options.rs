//! End-to-end tests for the `options` command.

mod common;
use common::prelude::*;

#[test]
fn test_options_assign_applies_when_released() {
    let fixture = TestFixture::new().with_base_and_app(true);

    fixture
        .command()
        .arg("options")
        .assert()
        .success()
        .stdout(predicate::str::contains("app.release = true (default)"))
        .stdout(predicate::str::contains("base.mode = \"prod\" (assign)"));
}

#[test]
fn test_options_default_without_release() {
    let fixture = TestFixture::new().with_base_and_app(false);

    fixture
        .command()
        .arg("options")
        .assert()
        .success()
        .stdout(predicate::str::contains("app.release = false (default)"))
        .stdout(predicate::str::contains("base.mode = \"dev\" (default)"));
}

#[test]
fn test_options_set_flag_assigns() {
    let fixture = TestFixture::new().with_base_and_app(false);

    fixture
        .command()
        .args(["options", "--set", "base.mode=prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("base.mode = \"prod\" (assign)"));
}

#[test]
fn test_options_profile_export() {
    let fixture = TestFixture::new()
        .with_base_and_app(false)
        .with_profile("project: \"dir:app\"\nexports:\n  base.mode: prod\n");

    fixture
        .command()
        .args(["options", "--exports"])
        .assert()
        .success()
        .stdout(predicate::str::contains("base.mode = \"prod\" (export)"))
        .stdout(predicate::str::contains("Exports"));
}

#[test]
fn test_options_rejects_value_outside_choices() {
    let fixture = TestFixture::new().with_base_and_app(false);

    fixture
        .command()
        .args(["options", "--set", "base.mode=staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("staging"));
}
