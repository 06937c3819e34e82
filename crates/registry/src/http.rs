//! Shared HTTP plumbing.

use releasekit_release::{Error, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Default timeout for registry requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("releasekit/", env!("CARGO_PKG_VERSION"));

pub(crate) fn client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

pub(crate) fn base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Send `request`; `None` on 404 or 410, the response on success.
async fn send(backend: &str, request: RequestBuilder) -> Result<Option<reqwest::Response>> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::backend(backend, format!("request failed: {e}")))?;
    let status = response.status();
    debug!(backend, url = %response.url(), %status, "Registry response");
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
        s if s.is_success() => Ok(Some(response)),
        s => Err(Error::backend(
            backend,
            format!("unexpected status {s} from {}", response.url()),
        )),
    }
}

/// Whether `url` answers with success (`false` on 404 or 410).
pub(crate) async fn exists(backend: &str, client: &Client, url: &str) -> Result<bool> {
    Ok(send(backend, client.get(url)).await?.is_some())
}

/// GET and decode JSON; `None` on 404 or 410.
pub(crate) async fn get_json<T: DeserializeOwned>(
    backend: &str,
    client: &Client,
    url: &str,
) -> Result<Option<T>> {
    match send(backend, client.get(url)).await? {
        Some(response) => response
            .json()
            .await
            .map(Some)
            .map_err(|e| Error::backend(backend, format!("invalid response from {url}: {e}"))),
        None => Ok(None),
    }
}

/// Send an authenticated mutation; `false` when the target is missing.
pub(crate) async fn mutate(backend: &str, request: RequestBuilder) -> Result<bool> {
    Ok(send(backend, request).await?.is_some())
}
