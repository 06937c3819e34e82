//! Exercises `GitCli` against real repositories in temp directories.
//!
//! Each test is skipped when no `git` binary is on PATH.

use releasekit_release::Vcs;
use releasekit_vcs::GitCli;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        status.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&status.stderr)
    );
}

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn commit(dir: &Path, rel: &str, message: &str) {
    write(dir, rel, message);
    git(dir, &["add", "--all"]);
    git(dir, &["commit", "--quiet", "--message", message]);
}

/// A work tree with a bare `origin` next to it.
fn repo() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let remote = tmp.path().join("remote.git");
    let work = tmp.path().join("work");
    std::fs::create_dir_all(&work).unwrap();
    git(tmp.path(), &["init", "--quiet", "--bare", "remote.git"]);
    git(&work, &["init", "--quiet"]);
    git(&work, &["config", "user.name", "Release Bot"]);
    git(&work, &["config", "user.email", "bot@example.com"]);
    git(&work, &["config", "commit.gpgsign", "false"]);
    git(&work, &["config", "tag.gpgsign", "false"]);
    git(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);
    commit(&work, "README.md", "chore: initial commit");
    git(&work, &["checkout", "--quiet", "-B", "main"]);
    (tmp, work)
}

#[tokio::test]
async fn test_log_window_and_paths() {
    if !git_available() {
        return;
    }
    let (_tmp, work) = repo();
    let vcs = GitCli::new(&work);

    vcs.create_tag("core-v1.0.0", "core 1.0.0", None).await.unwrap();
    commit(&work, "core/src/lib.rs", "feat(core): add api");
    commit(&work, "app/main.rs", "fix(app): crash");

    let all = vcs.log_since(Some("core-v1.0.0"), &[]).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].message, "fix(app): crash");
    assert_eq!(all[1].files, vec![PathBuf::from("core/src/lib.rs")]);

    let core = vcs
        .log_since(Some("core-v1.0.0"), &[PathBuf::from("core")])
        .await
        .unwrap();
    assert_eq!(core.len(), 1);
    assert_eq!(core[0].message, "feat(core): add api");

    let diff = vcs.diff_files_since("core-v1.0.0").await.unwrap();
    assert_eq!(diff.len(), 2);
    let files = vcs.changed_files(&all[0].sha).await.unwrap();
    assert_eq!(files, vec![PathBuf::from("app/main.rs")]);
}

#[tokio::test]
async fn test_tags_local_and_remote() {
    if !git_available() {
        return;
    }
    let (_tmp, work) = repo();
    let vcs = GitCli::new(&work);

    assert!(!vcs.tag_exists("v1.0.0").await.unwrap());
    vcs.create_tag("v1.0.0", "release", None).await.unwrap();
    assert!(vcs.tag_exists("v1.0.0").await.unwrap());
    assert!(vcs.create_tag("v1.0.0", "again", None).await.is_err());

    assert!(!vcs.remote_tag_exists("v1.0.0").await.unwrap());
    vcs.push_tags(&["v1.0.0".to_string()]).await.unwrap();
    assert!(vcs.remote_tag_exists("v1.0.0").await.unwrap());

    vcs.delete_remote_tag("v1.0.0").await.unwrap();
    assert!(!vcs.remote_tag_exists("v1.0.0").await.unwrap());
    // Deleting again is not an error.
    vcs.delete_remote_tag("v1.0.0").await.unwrap();

    vcs.delete_tag("v1.0.0").await.unwrap();
    assert!(!vcs.tag_exists("v1.0.0").await.unwrap());
}

#[tokio::test]
async fn test_tag_at_explicit_commit() {
    if !git_available() {
        return;
    }
    let (_tmp, work) = repo();
    let vcs = GitCli::new(&work);
    let merge = vcs.head_sha().await.unwrap();
    commit(&work, "docs/later.md", "docs: after the merge");
    assert_ne!(vcs.head_sha().await.unwrap(), merge);

    vcs.create_tag("core-v2.0.0", "core 2.0.0", Some(&merge)).await.unwrap();

    let out = Command::new("git")
        .args(["rev-list", "-n", "1", "core-v2.0.0"])
        .current_dir(&work)
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), merge);
}

#[tokio::test]
async fn test_branch_commit_and_push() {
    if !git_available() {
        return;
    }
    let (_tmp, work) = repo();
    let vcs = GitCli::new(&work);

    assert!(vcs.is_clean().await.unwrap());
    assert!(!vcs.is_shallow().await.unwrap());
    assert_eq!(vcs.current_branch().await.unwrap(), "main");

    vcs.checkout_new_branch("releasekit--release--rs").await.unwrap();
    assert_eq!(vcs.current_branch().await.unwrap(), "releasekit--release--rs");

    write(&work, "Cargo.toml", "[package]\nversion = \"1.1.0\"\n");
    assert!(!vcs.is_clean().await.unwrap());
    let before = vcs.head_sha().await.unwrap();
    vcs.commit_all("chore(release): core 1.1.0").await.unwrap();
    assert!(vcs.is_clean().await.unwrap());
    assert_ne!(vcs.head_sha().await.unwrap(), before);

    vcs.push_branch("releasekit--release--rs", true).await.unwrap();
    let remote = work.parent().unwrap().join("remote.git");
    let out = Command::new("git")
        .args(["branch", "--list"])
        .current_dir(remote)
        .output()
        .unwrap();
    assert!(String::from_utf8_lossy(&out.stdout).contains("releasekit--release--rs"));
}
