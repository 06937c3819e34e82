//! pub.dev.

use crate::http;
use async_trait::async_trait;
use releasekit_release::{Registry, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

/// Default pub.dev endpoint.
pub const PUB_DEV_API: &str = "https://pub.dev";

const NAME: &str = "pub.dev";

/// pub.dev API client.
#[derive(Debug, Clone)]
pub struct PubDev {
    base_url: String,
    client: Client,
}

impl Default for PubDev {
    fn default() -> Self {
        Self::new(PUB_DEV_API)
    }
}

impl PubDev {
    /// Client for a pub server at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: http::base(base_url),
            client: http::client(),
        }
    }

    fn version_url(&self, package: &str, version: &str) -> String {
        format!("{}/api/packages/{package}/versions/{version}", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(default)]
    archive_sha256: Option<String>,
}

#[async_trait]
impl Registry for PubDev {
    fn name(&self) -> &str {
        NAME
    }

    async fn version_exists(&self, package: &str, version: &str) -> Result<bool> {
        http::exists(NAME, &self.client, &self.version_url(package, version)).await
    }

    async fn checksums(&self, package: &str, version: &str) -> Result<BTreeMap<String, String>> {
        let response: Option<VersionResponse> =
            http::get_json(NAME, &self.client, &self.version_url(package, version)).await?;
        Ok(response
            .and_then(|r| r.archive_sha256)
            .map(|sum| BTreeMap::from([(format!("{package}-{version}.tar.gz"), sum)]))
            .unwrap_or_default())
    }

    async fn yank(&self, package: &str, version: &str, _reason: Option<&str>) -> Result<bool> {
        info!(package, version, "pub.dev retraction is only available from the package admin page");
        Ok(false)
    }
}
