//! SHA-256 digests of build artifacts and their verification against a
//! registry.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const BUFFER_SIZE: usize = 8192;

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Lowercase hex SHA-256 of a file, read in chunks.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Digests of `artifacts` keyed by file name.
///
/// # Errors
///
/// Returns an I/O error if any artifact cannot be read.
pub fn sha256_artifacts(artifacts: &[PathBuf]) -> Result<BTreeMap<String, String>> {
    artifacts
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok((name, sha256_file(path)?))
        })
        .collect()
}

/// Compare local digests to the registry's.
///
/// Files the registry does not report are not checked, so a registry that
/// exposes no digests verifies trivially.
///
/// # Errors
///
/// Returns [`Error::ChecksumMismatch`] for the first differing file.
pub fn verify(
    package: &str,
    local: &BTreeMap<String, String>,
    remote: &BTreeMap<String, String>,
) -> Result<()> {
    for (file, digest) in local {
        if let Some(remote_digest) = remote.get(file)
            && !remote_digest.eq_ignore_ascii_case(digest)
        {
            return Err(Error::ChecksumMismatch {
                package: package.to_string(),
                file: file.clone(),
                local: digest.clone(),
                remote: remote_digest.clone(),
            });
        }
    }
    Ok(())
}

/// Combined digest over several artifacts, stable under reordering. Used as
/// the per-package checksum in the release manifest.
#[must_use]
pub fn combined(digests: &BTreeMap<String, String>) -> Option<String> {
    match digests.len() {
        0 => None,
        1 => digests.values().next().cloned(),
        _ => {
            let joined: Vec<String> = digests.iter().map(|(f, d)| format!("{d}  {f}")).collect();
            Some(sha256_bytes(joined.join("\n").as_bytes()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_bytes(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_file_digest_matches_bytes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pkg-1.0.0.tar");
        let content = vec![7u8; BUFFER_SIZE * 2 + 13];
        std::fs::write(&path, &content).unwrap();
        assert_eq!(sha256_file(&path).unwrap(), sha256_bytes(&content));

        let digests = sha256_artifacts(&[path]).unwrap();
        assert_eq!(digests.keys().collect::<Vec<_>>(), ["pkg-1.0.0.tar"]);
    }

    #[test]
    fn test_verify() {
        let local = BTreeMap::from([("a.whl".to_string(), "ab".to_string())]);
        assert!(verify("p", &local, &BTreeMap::new()).is_ok());
        let same = BTreeMap::from([("a.whl".to_string(), "AB".to_string())]);
        assert!(verify("p", &local, &same).is_ok());
        let other = BTreeMap::from([("a.whl".to_string(), "cd".to_string())]);
        assert!(matches!(
            verify("p", &local, &other),
            Err(Error::ChecksumMismatch { .. })
        ));
    }
}
