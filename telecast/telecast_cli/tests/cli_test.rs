//! End-to-end tests for the CLI frontend.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn help_describes_the_runner() {
    Command::cargo_bin("telecast_cli")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config-dir"));
}

#[test]
fn startup_succeeds_with_seeded_movies_directory() {
    let config = TempDir::new().unwrap();
    let movies = TempDir::new().unwrap();
    fs::write(movies.path().join("keeper.mp4"), "video").unwrap();

    Command::cargo_bin("telecast_cli")
        .unwrap()
        .arg("--config-dir")
        .arg(config.path())
        .arg("--movies-dir")
        .arg(movies.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("startup complete"));
}

#[test]
fn startup_fails_with_missing_movies_directory() {
    let config = TempDir::new().unwrap();
    let movies = TempDir::new().unwrap();

    Command::cargo_bin("telecast_cli")
        .unwrap()
        .arg("--config-dir")
        .arg(config.path())
        .arg("--movies-dir")
        .arg(movies.path().join("missing"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Video Directory Missing"));
}
