//! The npm registry.
//!
//! npm exposes SHA-512 integrity and SHA-1 shasums only, so
//! [`Registry::checksums`] is empty. Yanking maps to `npm deprecate`, since
//! unpublishing is restricted to the first 72 hours.

use crate::http;
use async_trait::async_trait;
use releasekit_release::{Cmd, Error, Registry, Result};
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::info;

/// Default npm registry.
pub const NPM_REGISTRY: &str = "https://registry.npmjs.org";

const NAME: &str = "npm";

/// npm registry client.
#[derive(Debug, Clone)]
pub struct Npm {
    base_url: String,
    client: Client,
}

impl Default for Npm {
    fn default() -> Self {
        Self::new(NPM_REGISTRY)
    }
}

impl Npm {
    /// Client for the registry at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: http::base(base_url),
            client: http::client(),
        }
    }
}

/// Escape a package name for a registry URL (`@scope/name` becomes
/// `@scope%2Fname`).
#[must_use]
pub fn escape_name(package: &str) -> String {
    package.replace('/', "%2F")
}

#[async_trait]
impl Registry for Npm {
    fn name(&self) -> &str {
        NAME
    }

    async fn version_exists(&self, package: &str, version: &str) -> Result<bool> {
        let url = format!("{}/{}/{version}", self.base_url, escape_name(package));
        http::exists(NAME, &self.client, &url).await
    }

    async fn checksums(&self, _package: &str, _version: &str) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }

    async fn yank(&self, package: &str, version: &str, reason: Option<&str>) -> Result<bool> {
        let spec = format!("{package}@{version}");
        let message = reason.unwrap_or("This version has been withdrawn");
        let cmd = Cmd::new("npm").args([
            "deprecate",
            spec.as_str(),
            message,
            "--registry",
            self.base_url.as_str(),
        ]);
        let out = cmd.run().await?;
        if !out.success {
            return Err(Error::backend(
                NAME,
                format!("npm deprecate {spec} failed: {}", out.summary()),
            ));
        }
        info!(package, version, "Deprecated npm version");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_scoped_name() {
        assert_eq!(escape_name("@acme/ui"), "@acme%2Fui");
        assert_eq!(escape_name("left-pad"), "left-pad");
    }
}
