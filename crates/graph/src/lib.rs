//! Package dependency graph algorithms for releasekit.
//!
//! This crate provides the directed graph used to order releases across a
//! monorepo. Nodes are packages, edges point from a dependency to the
//! packages that depend on it.
//!
//! # Key Types
//!
//! - [`PackageGraph`]: builds the graph and answers ordering queries
//! - [`PackageNodeData`]: trait package types implement to be stored in the graph
//! - [`GraphNode`]: a node holding the package name and its data
//!
//! # Example
//!
//! ```ignore
//! use releasekit_graph::{PackageGraph, PackageNodeData};
//!
//! struct Pkg {
//!     deps: Vec<String>,
//! }
//!
//! impl PackageNodeData for Pkg {
//!     fn dependency_names(&self) -> impl Iterator<Item = &str> {
//!         self.deps.iter().map(String::as_str)
//!     }
//! }
//!
//! let mut graph = PackageGraph::new();
//! graph.add_package("core", Pkg { deps: vec![] });
//! graph.add_package("plugin", Pkg { deps: vec!["core".to_string()] });
//! graph.add_dependency_edges();
//!
//! let levels = graph.publish_levels()?;
//! assert_eq!(levels, vec![vec!["core"], vec!["plugin"]]);
//! ```

mod error;
mod graph;

pub use error::{Error, Result};
pub use graph::{GraphNode, PackageGraph, PublishLevels};

/// Trait for package data that can be stored in a [`PackageGraph`].
pub trait PackageNodeData {
    /// Returns the names of packages this package depends on.
    ///
    /// Names that are not present in the graph are treated as external
    /// dependencies and do not produce edges.
    fn dependency_names(&self) -> impl Iterator<Item = &str>;
}
