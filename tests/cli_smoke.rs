#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

fn canopy(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("canopy").unwrap();
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .env("HOME", dir)
        .env_remove("CANOPY_DIR");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let temp = tempfile::tempdir().unwrap();

    canopy(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("tree"))
        .stdout(predicate::str::contains("checkpoint"))
        .stdout(predicate::str::contains("recent"));
}

#[test]
fn test_init_then_tree_from_dump() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path();
    std::fs::write(
        path.join("board.json"),
        r#"[
            {"key": "WEB-1", "fields": {"summary": "Launch", "issuetype": {"name": "Epic"}}},
            {"key": "WEB-2", "fields": {"summary": "Landing page", "parent": {"key": "WEB-1"}}}
        ]"#,
    )
    .unwrap();

    canopy(path)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized canopy state"));

    canopy(path)
        .args(["tree", "board.json", "--expand-all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WEB-1").and(predicate::str::contains("  · WEB-2")))
        .stdout(predicate::str::contains("2 of 2 issues shown"));
}

#[test]
fn test_uninitialized_changes_fails_with_hint() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("board.json"), "[]").unwrap();

    canopy(temp.path())
        .args(["changes", "board.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("canopy init"));
}
