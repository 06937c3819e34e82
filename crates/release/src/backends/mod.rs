//! Side-effect boundaries.
//!
//! Every mutation the release flow performs goes through one of these
//! traits. Callers hold `Arc<dyn Trait>`, so real implementations (in the
//! provider crates) and the in-memory fakes in `fake` (behind the
//! `test-utils` feature) are interchangeable.

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;
pub mod forge;
pub mod package_manager;
pub mod registry;
pub mod vcs;

pub use forge::{
    Capability, Forge, NoForge, PrState, PullRequest, PullRequestDraft, ReleaseDraft, can,
};
pub use package_manager::{CommandOutput, PackageManager};
pub use registry::Registry;
pub use vcs::{CommitRecord, Vcs};
