//! Workspace discovery for releasekit across multiple ecosystems.
//!
//! This crate turns a workspace root into a list of [`Package`]s and knows
//! how to rewrite each ecosystem's manifest format.
//!
//! # Architecture
//!
//! - [`WorkspaceBackend`] - per-ecosystem discovery plus manifest rewriting
//!   (exact-version pinning of internal dependencies and version bumps)
//! - [`PackageFilter`] - assigns groups and applies exclusion patterns
//! - [`Package`] / [`Ecosystem`] - the shared data model
//!
//! ## Discovery behavior for edge cases
//!
//! - A root manifest without a workspace section is a single-package
//!   workspace (Cargo, uv, pub) or yields nothing (npm without `name`).
//! - Members whose manifest fails to parse are skipped with a warning.
//! - Dependencies on anything outside the discovered set are dropped, so
//!   edges are always intra-workspace and intra-ecosystem.
//!
//! # Example
//!
//! ```rust,ignore
//! use releasekit_workspaces::{Ecosystem, backend_for};
//! use std::path::Path;
//!
//! let backend = backend_for(Ecosystem::Python);
//! for package in backend.discover(Path::new("py"))? {
//!     println!("{} {}", package.name, package.version);
//! }
//! ```

pub mod discovery;
pub mod error;
pub mod filter;
pub mod package;

pub use discovery::{
    CargoWorkspace, DartWorkspace, GoWorkspace, JavaScriptWorkspace, PythonWorkspace,
    WorkspaceBackend, backend_for, resolve_glob_patterns,
};
pub use error::{Error, Result};
pub use filter::{NameMatcher, PackageFilter};
pub use package::{Ecosystem, Package};
