//! PyPI, through its JSON API.

use crate::http;
use async_trait::async_trait;
use releasekit_release::{Registry, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

/// Default PyPI endpoint.
pub const PYPI_API: &str = "https://pypi.org";

const NAME: &str = "pypi";

/// PyPI JSON API client.
#[derive(Debug, Clone)]
pub struct PyPi {
    base_url: String,
    client: Client,
}

impl Default for PyPi {
    fn default() -> Self {
        Self::new(PYPI_API)
    }
}

impl PyPi {
    /// Client for the index at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: http::base(base_url),
            client: http::client(),
        }
    }

    fn release_url(&self, package: &str, version: &str) -> String {
        format!("{}/pypi/{}/{version}/json", self.base_url, normalize_name(package))
    }
}

/// PEP 503 name normalization.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep {
                out.push('-');
            }
            last_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_sep = false;
        }
    }
    out
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    #[serde(default)]
    urls: Vec<ReleaseFile>,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
    filename: String,
    #[serde(default)]
    digests: BTreeMap<String, String>,
}

#[async_trait]
impl Registry for PyPi {
    fn name(&self) -> &str {
        NAME
    }

    async fn version_exists(&self, package: &str, version: &str) -> Result<bool> {
        http::exists(NAME, &self.client, &self.release_url(package, version)).await
    }

    async fn checksums(&self, package: &str, version: &str) -> Result<BTreeMap<String, String>> {
        let response: Option<ReleaseResponse> =
            http::get_json(NAME, &self.client, &self.release_url(package, version)).await?;
        Ok(response
            .map(|r| {
                r.urls
                    .into_iter()
                    .filter_map(|f| {
                        let digest = f.digests.get("sha256")?.clone();
                        Some((f.filename, digest))
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn yank(&self, package: &str, version: &str, _reason: Option<&str>) -> Result<bool> {
        info!(package, version, "PyPI has no yank API; yank the release from the project page");
        Ok(false)
    }
}
