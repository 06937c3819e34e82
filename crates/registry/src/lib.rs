//! Package registry clients for releasekit.
//!
//! Each client implements [`releasekit_release::Registry`] over the
//! registry's public HTTP API:
//!
//! | Ecosystem  | Client            | Checksums         | Yank                   |
//! |------------|-------------------|-------------------|------------------------|
//! | Rust       | [`CratesIo`]      | `.crate` SHA-256  | API, `CARGO_REGISTRY_TOKEN` |
//! | JavaScript | [`Npm`]           | none (SHA-512)    | `npm deprecate`        |
//! | Python     | [`PyPi`]          | per-file SHA-256  | not available          |
//! | Go         | [`GoProxy`]       | none              | not available          |
//! | Dart       | [`PubDev`]        | archive SHA-256   | not available          |
//!
//! # Example
//!
//! ```rust,ignore
//! use releasekit_registry::registry_for;
//! use releasekit_workspaces::Ecosystem;
//!
//! let registry = registry_for(Ecosystem::Python, None);
//! let published = registry.version_exists("requests", "2.32.0").await?;
//! ```

pub mod crates_io;
pub mod go_proxy;
mod http;
pub mod npm;
pub mod pub_dev;
pub mod pypi;

pub use crates_io::CratesIo;
pub use go_proxy::GoProxy;
pub use http::{DEFAULT_TIMEOUT_SECS, USER_AGENT};
pub use npm::Npm;
pub use pub_dev::PubDev;
pub use pypi::PyPi;

use releasekit_release::Registry;
use releasekit_workspaces::Ecosystem;
use std::sync::Arc;

/// The registry client for `ecosystem`, optionally at a custom base URL.
#[must_use]
pub fn registry_for(ecosystem: Ecosystem, base_url: Option<&str>) -> Arc<dyn Registry> {
    match ecosystem {
        Ecosystem::Rust => Arc::new(base_url.map_or_else(CratesIo::default, CratesIo::new)),
        Ecosystem::JavaScript => Arc::new(base_url.map_or_else(Npm::default, Npm::new)),
        Ecosystem::Python => Arc::new(base_url.map_or_else(PyPi::default, PyPi::new)),
        Ecosystem::Go => Arc::new(base_url.map_or_else(GoProxy::default, GoProxy::new)),
        Ecosystem::Dart => Arc::new(base_url.map_or_else(PubDev::default, PubDev::new)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_for_names() {
        assert_eq!(registry_for(Ecosystem::Rust, None).name(), "crates.io");
        assert_eq!(registry_for(Ecosystem::JavaScript, None).name(), "npm");
        assert_eq!(registry_for(Ecosystem::Python, Some("http://localhost:1")).name(), "pypi");
        assert_eq!(registry_for(Ecosystem::Go, None).name(), "go-proxy");
        assert_eq!(registry_for(Ecosystem::Dart, None).name(), "pub.dev");
    }
}
