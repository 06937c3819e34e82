//! Drives `GlabForge` against a stub `glab` script.

#![cfg(unix)]

use releasekit_gitlab::GlabForge;
use releasekit_release::{Forge, PrState, PullRequestDraft};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

const STUB: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
case "$1 $2" in
  "mr create") echo "https://gitlab.com/acme/widgets/-/merge_requests/8" ;;
  "mr list") echo '[{"iid":8,"title":"t","description":"b",
    "source_branch":"releasekit--release--py","target_branch":"main",
    "labels":["autorelease: pending"],"state":"merged","merge_commit_sha":"abc"}]' ;;
  "release view") echo "ERROR: 404 Not Found" >&2; exit 1 ;;
esac
exit 0
"#;

fn stub() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("glab");
    std::fs::write(&path, STUB).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    (dir, path)
}

#[tokio::test]
async fn test_merge_request_round() {
    let (dir, program) = stub();
    let glab = GlabForge::new(dir.path()).with_program(program.to_string_lossy());

    let pr = glab
        .create_pr(&PullRequestDraft {
            title: "chore(release): py".to_string(),
            body: "plan".to_string(),
            head: "releasekit--release--py".to_string(),
            base: "main".to_string(),
            labels: vec!["autorelease: pending".to_string(), "release".to_string()],
        })
        .await
        .unwrap();
    assert_eq!(pr.number, 8);

    let merged = glab.list_prs("autorelease: pending", PrState::Merged).await.unwrap();
    assert_eq!(merged[0].merge_sha.as_deref(), Some("abc"));
    assert!(!glab.release_exists("py-v1.0.0").await.unwrap());
    glab.delete_release("py-v1.0.0").await.unwrap();

    let log = std::fs::read_to_string(dir.path().join("calls.log")).unwrap();
    assert!(log.contains("--label autorelease: pending,release"));
    assert!(
        log.contains("mr list --label autorelease: pending --output json --per-page 100 --merged")
    );
}
