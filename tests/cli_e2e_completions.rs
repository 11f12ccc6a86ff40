//! End-to-end tests for the `stitch completions` command.

mod common;
use common::prelude::*;

#[test]
fn test_completions_help() {
    TestFixture::new()
        .command()
        .args(["completions", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generate shell completion scripts"))
        .stdout(predicate::str::contains("bash"))
        .stdout(predicate::str::contains("zsh"));
}

#[test]
fn test_completions_bash() {
    TestFixture::new()
        .command()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_stitch()"))
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_completions_fish() {
    TestFixture::new()
        .command()
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete -c stitch"));
}

#[test]
fn test_completions_invalid_shell() {
    TestFixture::new()
        .command()
        .args(["completions", "tcsh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
