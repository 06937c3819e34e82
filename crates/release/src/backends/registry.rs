//! Package registry boundary (existence checks, checksums, yanking).

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Read access to a registry plus yanking.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Registry name for logs.
    fn name(&self) -> &str;

    /// Whether `package@version` is published.
    async fn version_exists(&self, package: &str, version: &str) -> Result<bool>;

    /// SHA-256 digests of the published files, keyed by file name. Empty when
    /// the registry does not expose digests.
    async fn checksums(&self, package: &str, version: &str) -> Result<BTreeMap<String, String>>;

    /// Wait until `package@version` is visible. `false` means not yet
    /// confirmed within `timeout`, which callers treat as a warning.
    async fn poll_version(
        &self,
        package: &str,
        version: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.version_exists(package, version).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => debug!(package, version, error = %e, "Registry poll failed, retrying"),
            }
            if tokio::time::Instant::now() + interval > deadline {
                return Ok(false);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Yank or deprecate `package@version`. Returns `false` when the registry
    /// has no yank operation.
    async fn yank(&self, package: &str, version: &str, reason: Option<&str>) -> Result<bool>;
}
