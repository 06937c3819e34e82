//! Helpers shared by the drivers.

use releasekit_release::{CommandOutput, Result};
use releasekit_workspaces::Package;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Directory holding `package`'s manifest.
pub(crate) fn package_dir(package: &Package) -> PathBuf {
    package
        .manifest_path
        .parent()
        .map_or_else(|| package.path.clone(), Path::to_path_buf)
}

/// Files in `dir` whose names end with one of `suffixes`, sorted.
pub(crate) fn collect_artifacts(dir: &Path, suffixes: &[&str]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if !dir.exists() {
        return Ok(found);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| suffixes.iter().any(|s| n.ends_with(s)));
        if path.is_file() && matches {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Attach artifacts to a successful output.
pub(crate) fn with_artifacts(
    output: CommandOutput,
    dir: &Path,
    suffixes: &[&str],
) -> Result<CommandOutput> {
    if !output.success {
        return Ok(output);
    }
    let artifacts = collect_artifacts(dir, suffixes)?;
    Ok(output.with_artifacts(artifacts))
}

/// Fresh directory for a smoke-test install, removed on drop.
pub(crate) fn scratch(prefix: &str) -> Result<TempDir> {
    Ok(tempfile::Builder::new().prefix(prefix).tempdir()?)
}

/// Importable identifier for a package name (`my-pkg` becomes `my_pkg`).
pub(crate) fn import_name(name: &str) -> String {
    name.replace(['-', '.'], "_")
}

/// Run `steps` in order, stopping at the first unsuccessful one.
pub(crate) async fn run_steps(steps: Vec<releasekit_release::Cmd>) -> Result<CommandOutput> {
    let mut last = CommandOutput::ok();
    for step in steps {
        last = step.run().await?;
        if !last.success {
            break;
        }
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_artifacts_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b-1.0.0.tar.gz", "a-1.0.0-py3-none-any.whl", "notes.txt"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let found = collect_artifacts(dir.path(), &[".whl", ".tar.gz"]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a-1.0.0-py3-none-any.whl", "b-1.0.0.tar.gz"]);
        assert!(collect_artifacts(&dir.path().join("missing"), &[".whl"]).unwrap().is_empty());
    }

    #[test]
    fn test_import_name() {
        assert_eq!(import_name("genkit-plugin-ollama"), "genkit_plugin_ollama");
    }

    #[test]
    fn test_package_dir_from_manifest() {
        let pkg = Package::new(
            "core",
            "1.0.0",
            "crates/core",
            "/repo/crates/core/Cargo.toml",
            releasekit_workspaces::Ecosystem::Rust,
        );
        assert_eq!(package_dir(&pkg), PathBuf::from("/repo/crates/core"));
    }
}
