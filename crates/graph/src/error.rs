//! Error types for package graph operations.

use miette::Diagnostic;
use thiserror::Error;

/// Result type for package graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during package graph operations.
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum Error {
    /// One or more dependency cycles were found.
    #[error("Dependency cycle detected between packages: {}", format_cycles(cycles))]
    #[diagnostic(
        code(releasekit::graph::cycle),
        help(
            "Break the cycle by removing one of the listed dependency edges \
             or excluding a package"
        )
    )]
    CycleDetected {
        /// Every strongly connected group of packages that forms a cycle,
        /// each sorted by name.
        cycles: Vec<Vec<String>>,
    },

    /// A package name was looked up that the graph does not contain.
    #[error("Package '{name}' is not part of the dependency graph")]
    #[diagnostic(code(releasekit::graph::unknown_package))]
    UnknownPackage {
        /// The missing package name.
        name: String,
    },
}

impl Error {
    /// Names of every package that sits on a cycle, sorted and deduplicated.
    #[must_use]
    pub fn cycle_members(&self) -> Vec<String> {
        match self {
            Self::CycleDetected { cycles } => {
                let mut names: Vec<String> = cycles.iter().flatten().cloned().collect();
                names.sort();
                names.dedup();
                names
            }
            Self::UnknownPackage { .. } => Vec::new(),
        }
    }
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| {
            let mut path = cycle.clone();
            if let Some(first) = cycle.first() {
                path.push(first.clone());
            }
            path.join(" -> ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}
