//! Discovery feeding the package graph end to end.

use releasekit_graph::PackageGraph;
use releasekit_workspaces::{Ecosystem, PackageFilter, backend_for};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn cargo_workspace_levels() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "Cargo.toml", "[workspace]\nmembers = [\"crates/*\"]\n");
    write(root, "crates/core/Cargo.toml", "[package]\nname = \"core\"\nversion = \"1.0.0\"\n");
    write(
        root,
        "crates/macros/Cargo.toml",
        "[package]\nname = \"macros\"\nversion = \"1.0.0\"\n[dependencies]\n\
            core = { path = \"../core\" }\n",
    );
    write(
        root,
        "crates/cli/Cargo.toml",
        "[package]\nname = \"cli\"\nversion = \"1.0.0\"\n[dependencies]\n\
            core = { path = \"../core\" }\nmacros = { path = \"../macros\" }\nclap = \"4\"\n",
    );

    let packages = backend_for(Ecosystem::Rust).discover(root).unwrap();
    let graph = PackageGraph::from_packages(packages.into_iter().map(|p| (p.name.clone(), p)));

    assert_eq!(
        graph.publish_levels().unwrap(),
        vec![vec!["core"], vec!["macros"], vec!["cli"]]
    );
}

#[test]
fn filtered_javascript_workspace_levels() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "package.json", r#"{"private": true, "workspaces": ["packages/*"]}"#);
    write(root, "packages/core/package.json", r#"{"name": "core", "version": "1.0.0"}"#);
    write(
        root,
        "packages/ui/package.json",
        r#"{"name": "ui", "version": "1.0.0", "dependencies": {"core": "workspace:*"}}"#,
    );
    write(
        root,
        "packages/docs/package.json",
        r#"{"name": "docs", "version": "1.0.0", "dependencies": {"ui": "workspace:*"}}"#,
    );

    let packages = backend_for(Ecosystem::JavaScript).discover(root).unwrap();
    let filter = PackageFilter::new(&BTreeMap::new(), &["docs".to_string()], &[]).unwrap();
    let packages = filter.apply(packages, &[]).unwrap();
    let graph = PackageGraph::from_packages(packages.into_iter().map(|p| (p.name.clone(), p)));

    assert_eq!(graph.publish_levels().unwrap(), vec![vec!["core"], vec!["ui"]]);
}
