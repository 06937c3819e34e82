//! crates.io.

use crate::http;
use async_trait::async_trait;
use releasekit_release::{Error, Registry, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

/// Default crates.io endpoint.
pub const CRATES_IO_API: &str = "https://crates.io";

/// Environment variable holding the token used for yanking.
pub const TOKEN_ENV: &str = "CARGO_REGISTRY_TOKEN";

const NAME: &str = "crates.io";

/// crates.io API client.
#[derive(Debug, Clone)]
pub struct CratesIo {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl Default for CratesIo {
    fn default() -> Self {
        Self::new(CRATES_IO_API)
    }
}

impl CratesIo {
    /// Client for a crates.io-compatible API at `base_url`. Picks up
    /// [`TOKEN_ENV`] for yanking.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: http::base(base_url),
            client: http::client(),
            token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
        }
    }

    /// Use `token` for authenticated calls.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn version_url(&self, package: &str, version: &str) -> String {
        format!("{}/api/v1/crates/{package}/{version}", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: VersionData,
}

#[derive(Debug, Deserialize)]
struct VersionData {
    #[serde(default)]
    checksum: Option<String>,
}

#[async_trait]
impl Registry for CratesIo {
    fn name(&self) -> &str {
        NAME
    }

    /// Yanked versions still exist: crates.io never accepts the same
    /// version twice.
    async fn version_exists(&self, package: &str, version: &str) -> Result<bool> {
        http::exists(NAME, &self.client, &self.version_url(package, version)).await
    }

    async fn checksums(&self, package: &str, version: &str) -> Result<BTreeMap<String, String>> {
        let response: Option<VersionResponse> =
            http::get_json(NAME, &self.client, &self.version_url(package, version)).await?;
        Ok(response
            .and_then(|r| r.version.checksum)
            .map(|sum| BTreeMap::from([(format!("{package}-{version}.crate"), sum)]))
            .unwrap_or_default())
    }

    async fn yank(&self, package: &str, version: &str, reason: Option<&str>) -> Result<bool> {
        let token = self.token.as_deref().ok_or_else(|| {
            Error::config(
                format!("cannot yank {package}@{version}: {TOKEN_ENV} is not set"),
                format!("Export {TOKEN_ENV} with a token that owns {package}"),
            )
        })?;
        let url = format!("{}/yank", self.version_url(package, version));
        let request = self.client.delete(&url).header("Authorization", token);
        if http::mutate(NAME, request).await? {
            info!(package, version, reason = reason.unwrap_or_default(), "Yanked crate version");
            Ok(true)
        } else {
            Err(Error::backend(NAME, format!("{package}@{version} is not published")))
        }
    }
}
