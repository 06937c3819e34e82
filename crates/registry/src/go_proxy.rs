//! The Go module proxy.
//!
//! Modules are never uploaded; a tag push makes them resolvable, so
//! existence means the proxy has fetched `module@vX.Y.Z`.

use crate::http;
use async_trait::async_trait;
use releasekit_release::{Registry, Result};
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::info;

/// Default Go module proxy.
pub const GO_PROXY: &str = "https://proxy.golang.org";

const NAME: &str = "go-proxy";

/// Go module proxy client.
#[derive(Debug, Clone)]
pub struct GoProxy {
    base_url: String,
    client: Client,
}

impl Default for GoProxy {
    fn default() -> Self {
        Self::new(GO_PROXY)
    }
}

impl GoProxy {
    /// Client for the proxy at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: http::base(base_url),
            client: http::client(),
        }
    }
}

/// Case-encode a module path for the proxy protocol: each uppercase letter
/// becomes `!` followed by its lowercase form.
#[must_use]
pub fn escape_module_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn go_version(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    }
}

#[async_trait]
impl Registry for GoProxy {
    fn name(&self) -> &str {
        NAME
    }

    async fn version_exists(&self, package: &str, version: &str) -> Result<bool> {
        let url = format!(
            "{}/{}/@v/{}.info",
            self.base_url,
            escape_module_path(package),
            go_version(version)
        );
        http::exists(NAME, &self.client, &url).await
    }

    async fn checksums(&self, _package: &str, _version: &str) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }

    async fn yank(&self, package: &str, version: &str, _reason: Option<&str>) -> Result<bool> {
        info!(package, version, "Go modules are withdrawn with a `retract` directive in go.mod");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_module_path() {
        assert_eq!(
            escape_module_path("github.com/Azure/azure-sdk"),
            "github.com/!azure/azure-sdk"
        );
        assert_eq!(go_version("1.2.0"), "v1.2.0");
        assert_eq!(go_version("v1.2.0"), "v1.2.0");
    }
}
