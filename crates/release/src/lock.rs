//! Process-wide release lock.
//!
//! Only one prepare, release, publish or rollback may run against a
//! repository at a time. The lock is an OS advisory lock on
//! [`LOCK_FILE`], so it is released when the holder exits, including on
//! panic or crash. The file records `pid:timestamp:operation` of the current
//! holder for error messages only.

use crate::error::{Error, Result};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Lock file location relative to the repository root.
pub const LOCK_FILE: &str = ".releasekit/release.lock";

/// Contents of a lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockMetadata {
    /// Holder process id.
    pub pid: u32,
    /// Acquisition time, seconds since the Unix epoch.
    pub acquired_at: u64,
    /// Operation holding the lock.
    pub operation: String,
}

impl LockMetadata {
    fn serialize(&self) -> String {
        format!("{}:{}:{}", self.pid, self.acquired_at, self.operation)
    }

    fn deserialize(s: &str) -> Option<Self> {
        let mut parts = s.trim().splitn(3, ':');
        Some(Self {
            pid: parts.next()?.parse().ok()?,
            acquired_at: parts.next()?.parse().ok()?,
            operation: parts.next()?.to_string(),
        })
    }

    fn describe(&self) -> String {
        let age = current_timestamp().saturating_sub(self.acquired_at);
        format!("pid {} running {} for {age}s", self.pid, self.operation)
    }
}

/// Lock manager for one repository.
#[derive(Debug, Clone)]
pub struct ReleaseLock {
    path: PathBuf,
}

impl ReleaseLock {
    /// Lock at [`LOCK_FILE`] under `repo_root`.
    #[must_use]
    pub fn new(repo_root: &Path) -> Self {
        Self {
            path: repo_root.join(LOCK_FILE),
        }
    }

    /// Lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last recorded holder. Only meaningful while the lock is held.
    #[must_use]
    pub fn holder(&self) -> Option<LockMetadata> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| LockMetadata::deserialize(&s))
    }

    /// Take the lock without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if another run holds the lock.
    pub fn acquire(&self, operation: &str) -> Result<LockGuard> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        if !FileExt::try_lock_exclusive(&file)? {
            let holder = self
                .holder()
                .map_or_else(|| "another process".to_string(), |m| m.describe());
            return Err(Error::Locked {
                path: self.path.clone(),
                holder,
            });
        }

        let metadata = LockMetadata {
            pid: std::process::id(),
            acquired_at: current_timestamp(),
            operation: operation.to_string(),
        };
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(metadata.serialize().as_bytes())?;
        file.flush()?;

        tracing::debug!(path = %self.path.display(), operation, "Acquired release lock");
        Ok(LockGuard {
            path: self.path.clone(),
            file,
        })
    }
}

/// Held lock. Dropping it clears the holder record and unlocks.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to unlock release lock"
            );
        } else {
            tracing::debug!(path = %self.path.display(), "Released release lock");
        }
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_metadata_round_trip() {
        let meta = LockMetadata {
            pid: 42,
            acquired_at: 1_700_000_000,
            operation: "publish:py".to_string(),
        };
        assert_eq!(LockMetadata::deserialize(&meta.serialize()), Some(meta));
        assert_eq!(LockMetadata::deserialize("garbage"), None);
    }

    #[test]
    fn test_second_acquire_fails_until_release() {
        let temp = TempDir::new().unwrap();
        let lock = ReleaseLock::new(temp.path());

        let guard = lock.acquire("publish").unwrap();
        assert_eq!(lock.holder().unwrap().operation, "publish");

        let err = lock.acquire("rollback").unwrap_err();
        match err {
            Error::Locked { holder, .. } => assert!(holder.contains("publish")),
            other => panic!("unexpected error {other:?}"),
        }

        drop(guard);
        assert!(lock.holder().is_none());
        assert!(lock.acquire("rollback").is_ok());
    }

    #[test]
    fn test_leftover_file_does_not_block() {
        // A crashed holder leaves its record behind but not the OS lock.
        let temp = TempDir::new().unwrap();
        let lock = ReleaseLock::new(temp.path());
        fs::create_dir_all(lock.path().parent().unwrap()).unwrap();
        fs::write(lock.path(), format!("999999:{}:publish", current_timestamp())).unwrap();

        let _guard = lock.acquire("publish").unwrap();
        assert_eq!(lock.holder().unwrap().pid, std::process::id());
    }

    #[test]
    fn test_garbage_file_is_overwritten() {
        let temp = TempDir::new().unwrap();
        let lock = ReleaseLock::new(temp.path());
        fs::create_dir_all(lock.path().parent().unwrap()).unwrap();
        fs::write(lock.path(), "???").unwrap();
        let _guard = lock.acquire("prepare").unwrap();
        assert_eq!(lock.holder().unwrap().operation, "prepare");
    }
}
