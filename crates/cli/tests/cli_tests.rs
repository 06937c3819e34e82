//! End-to-end tests of the `releasekit` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CONFIG: &str = r#"
forge = "none"

[workspace.rs]
ecosystem = "rust"
"#;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A Cargo workspace where `app` depends on `core`.
fn cargo_repo() -> TempDir {
    let dir = tempfile::Builder::new().prefix("releasekit_test_").tempdir().unwrap();
    let root = dir.path();
    write(root, "releasekit.toml", CONFIG);
    write(root, "Cargo.toml", "[workspace]\nmembers = [\"crates/*\"]\n");
    write(
        root,
        "crates/core/Cargo.toml",
        "[package]\nname = \"core\"\nversion = \"0.3.0\"\n",
    );
    write(
        root,
        "crates/app/Cargo.toml",
        "[package]\nname = \"app\"\nversion = \"1.0.0\"\n\n\
         [dependencies]\ncore = { path = \"../core\", version = \"0.3.0\" }\n",
    );
    dir
}

fn releasekit(root: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("releasekit").unwrap();
    cmd.current_dir(root).env_remove("RELEASEKIT_CONFIG").env_remove("RELEASEKIT_LOG");
    cmd
}

#[test]
fn test_missing_config_exits_2() {
    let dir = TempDir::new().unwrap();
    releasekit(dir.path())
        .arg("discover")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No configuration file"));
}

#[test]
fn test_unknown_subcommand_exits_2() {
    let dir = TempDir::new().unwrap();
    releasekit(dir.path()).arg("ship-it").assert().code(2);
}

#[test]
fn test_discover_lists_packages() {
    let repo = cargo_repo();
    releasekit(repo.path())
        .args(["--log-level", "error", "discover"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[rs]"))
        .stdout(predicate::str::contains("core 0.3.0"))
        .stdout(predicate::str::contains("app 1.0.0"));
}

#[test]
fn test_discover_json() {
    let repo = cargo_repo();
    let output = releasekit(repo.path())
        .args(["--log-level", "error", "discover", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = value["rs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"core"));
    assert!(names.contains(&"app"));
}

#[test]
fn test_graph_levels_and_dot() {
    let repo = cargo_repo();
    releasekit(repo.path())
        .args(["--log-level", "error", "graph"])
        .assert()
        .success()
        .stdout(predicate::str::contains("level 0: core"))
        .stdout(predicate::str::contains("level 1: app"));

    releasekit(repo.path())
        .args(["--log-level", "error", "graph", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph"));
}

#[test]
fn test_unknown_workspace_exits_2() {
    let repo = cargo_repo();
    releasekit(repo.path())
        .args(["--log-level", "error", "discover", "--workspace", "java"])
        .assert()
        .code(2);
}

#[test]
fn test_config_flag_points_elsewhere() {
    let repo = cargo_repo();
    let elsewhere = TempDir::new().unwrap();
    releasekit(elsewhere.path())
        .args(["--log-level", "error", "--config"])
        .arg(repo.path().join("releasekit.toml"))
        .arg("discover")
        .assert()
        .success()
        .stdout(predicate::str::contains("core 0.3.0"));
}
