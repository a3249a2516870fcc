use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn prints_version() {
    Command::cargo_bin("reels-tui")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    Command::cargo_bin("reels-tui")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reels-TUI"))
        .stdout(predicate::str::contains("--offline"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn rejects_unknown_command() {
    Command::cargo_bin("reels-tui")
        .unwrap()
        .arg("dance")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"))
        .stderr(predicate::str::contains("dance"));
}

#[test]
fn upload_requires_video_flag() {
    Command::cargo_bin("reels-tui")
        .unwrap()
        .args(["upload", "--title", "Sunset"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--video"));
}

#[test]
fn offline_cannot_be_combined_with_a_subcommand() {
    Command::cargo_bin("reels-tui")
        .unwrap()
        .args(["--offline", "logout"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--offline"));
}
