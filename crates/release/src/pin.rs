//! Ephemeral dependency pinning.
//!
//! While a package is built and published its manifest pins every internal
//! dependency to the exact version being released, so the uploaded artifact
//! cannot resolve to a different sibling. The original bytes are restored
//! afterwards, whether the publish succeeded, failed or panicked.

use crate::checksum::sha256_bytes;
use crate::error::{Error, Result};
use releasekit_workspaces::WorkspaceBackend;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Suffix of the on-disk backup written next to a pinned manifest.
pub const BACKUP_SUFFIX: &str = ".releasekit-backup";

/// Backup path for `manifest`.
#[must_use]
pub fn backup_path(manifest: &Path) -> PathBuf {
    let mut name = manifest.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Restore `manifest` from a backup left by an interrupted run.
///
/// Returns whether a backup was found.
///
/// # Errors
///
/// Returns an I/O error if the backup cannot be copied back.
pub fn recover(manifest: &Path) -> Result<bool> {
    let backup = backup_path(manifest);
    if !backup.exists() {
        return Ok(false);
    }
    warn!(
        manifest = %manifest.display(),
        "Restoring manifest from a backup left by an interrupted run"
    );
    std::fs::copy(&backup, manifest)?;
    std::fs::remove_file(&backup)?;
    Ok(true)
}

/// Guard holding a pinned manifest. Restores on [`Self::restore`] or drop.
#[derive(Debug)]
pub struct EphemeralPin {
    manifest: PathBuf,
    backup: PathBuf,
    original: Vec<u8>,
    digest: String,
    restored: bool,
}

impl EphemeralPin {
    /// Back up `manifest` and rewrite it with `pins` (dependency name to
    /// exact version). An empty `pins` map still takes the backup.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read, backed up or
    /// rewritten. The manifest is left untouched in that case.
    pub fn apply(
        backend: &dyn WorkspaceBackend,
        manifest: &Path,
        pins: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let original = std::fs::read(manifest)?;
        let digest = sha256_bytes(&original);
        let backup = backup_path(manifest);
        std::fs::write(&backup, &original)?;

        let guard = Self {
            manifest: manifest.to_path_buf(),
            backup,
            original,
            digest,
            restored: false,
        };

        if !pins.is_empty() {
            let text = std::str::from_utf8(&guard.original).map_err(|e| {
                Error::Workspace(releasekit_workspaces::Error::edit(format!(
                    "{} is not UTF-8: {e}",
                    manifest.display()
                )))
            })?;
            let pinned = backend.pin_dependencies(text, pins)?;
            std::fs::write(manifest, pinned)?;
            debug!(
                manifest = %manifest.display(),
                pins = pins.len(),
                "Pinned internal dependencies"
            );
        }
        Ok(guard)
    }

    /// The pinned manifest path.
    #[must_use]
    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    /// SHA-256 of the manifest before pinning.
    #[must_use]
    pub fn original_digest(&self) -> &str {
        &self.digest
    }

    /// Restore the original bytes and verify them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RestoreMismatch`] if the manifest does not hash to
    /// its pre-pin digest afterwards; the backup file is kept in that case.
    pub fn restore(mut self) -> Result<()> {
        self.restore_in_place()
    }

    fn restore_in_place(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        std::fs::write(&self.manifest, &self.original)?;
        let written = std::fs::read(&self.manifest)?;
        if sha256_bytes(&written) != self.digest {
            return Err(Error::RestoreMismatch {
                path: self.manifest.clone(),
            });
        }
        self.restored = true;
        if let Err(e) = std::fs::remove_file(&self.backup) {
            warn!(backup = %self.backup.display(), error = %e, "Could not remove manifest backup");
        }
        debug!(manifest = %self.manifest.display(), "Restored manifest");
        Ok(())
    }
}

impl Drop for EphemeralPin {
    fn drop(&mut self) {
        if !self.restored
            && let Err(e) = self.restore_in_place()
        {
            error!(
                manifest = %self.manifest.display(),
                error = %e,
                "Failed to restore pinned manifest"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use releasekit_workspaces::CargoWorkspace;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"[package]
name = "app"
version = "1.0.0"

[dependencies]
core = { path = "../core", version = "1.0.0" } # internal
serde = "1"
"#;

    fn setup() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Cargo.toml");
        std::fs::write(&path, MANIFEST).unwrap();
        (temp, path)
    }

    fn pins() -> BTreeMap<String, String> {
        BTreeMap::from([("core".to_string(), "1.1.0".to_string())])
    }

    #[test]
    fn test_pin_and_restore_round_trip() {
        let (_temp, path) = setup();
        let pin = EphemeralPin::apply(&CargoWorkspace, &path, &pins()).unwrap();

        let pinned = std::fs::read_to_string(&path).unwrap();
        assert!(pinned.contains("\"=1.1.0\""));
        assert!(pinned.contains("serde = \"1\""));
        assert!(backup_path(&path).exists());
        assert_eq!(pin.original_digest(), sha256_bytes(MANIFEST.as_bytes()));

        pin.restore().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), MANIFEST);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_drop_restores() {
        let (_temp, path) = setup();
        {
            let _pin = EphemeralPin::apply(&CargoWorkspace, &path, &pins()).unwrap();
            assert_ne!(std::fs::read_to_string(&path).unwrap(), MANIFEST);
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), MANIFEST);
    }

    #[test]
    fn test_restore_after_panic() {
        let (_temp, path) = setup();
        let manifest = path.clone();
        let outcome = std::panic::catch_unwind(move || {
            let _pin = EphemeralPin::apply(&CargoWorkspace, &manifest, &pins()).unwrap();
            panic!("build exploded");
        });
        assert!(outcome.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), MANIFEST);
    }

    #[test]
    fn test_failed_rewrite_leaves_manifest_untouched() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Cargo.toml");
        std::fs::write(&path, "not [valid toml").unwrap();
        assert!(EphemeralPin::apply(&CargoWorkspace, &path, &pins()).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not [valid toml");
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_recover_from_leftover_backup() {
        let (_temp, path) = setup();
        std::fs::write(backup_path(&path), MANIFEST).unwrap();
        std::fs::write(&path, "half-written").unwrap();
        assert!(recover(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), MANIFEST);
        assert!(!recover(&path).unwrap());
    }
}
