//! GitLab forge backend for releasekit.
//!
//! [`GlabForge`] implements [`releasekit_release::Forge`] on top of the
//! `glab` CLI. Merge requests stand in for pull requests; releases, assets
//! and issues map one to one.

#![warn(missing_docs)]

pub mod forge;

pub use forge::{GlabForge, parse_mr_list};
