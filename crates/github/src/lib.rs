//! GitHub forge backend for releasekit.
//!
//! This crate provides [`GhForge`], an implementation of
//! [`releasekit_release::Forge`] that drives the `gh` CLI for pull requests,
//! labels, releases, release assets and issues. Authentication is whatever
//! `gh` is logged in with (`GH_TOKEN` / `GITHUB_TOKEN` in CI).
//!
//! # Example
//!
//! ```rust,ignore
//! use releasekit_github::{GhForge, parse_github_remote};
//!
//! let (owner, repo) = parse_github_remote("git@github.com:acme/widgets.git").unwrap();
//! let forge = GhForge::new(".").with_repo(owner, repo);
//! ```

#![warn(missing_docs)]

pub mod forge;
pub mod remote;

pub use forge::GhForge;
pub use remote::parse_github_remote;
