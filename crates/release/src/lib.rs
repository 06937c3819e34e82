//! Release planning and publishing for releasekit.
//!
//! This crate holds everything between workspace discovery and the concrete
//! provider backends: it turns commit history and changesets into a release
//! plan, then tags, publishes and verifies the planned packages in
//! dependency order.
//!
//! # Features
//!
//! - **Commit analysis**: conventional-commit parsing with revert netting and
//!   longest-prefix attribution of commits to packages
//! - **Versioning**: SemVer, PEP 440 and CalVer behind one [`VersioningScheme`]
//! - **Changesets**: hand-written bump declarations merged with commit bumps
//! - **Planning**: a pure [`plan`] over the dependency graph with capped
//!   propagation to dependents
//! - **Publishing**: a level-by-level pipeline with idempotency checks,
//!   ephemeral dependency pins, retries and checksum verification
//! - **Rollback**: tag and release deletion plus optional yanking
//!
//! # Architecture
//!
//! - [`backends`] - `Vcs`, `Forge`, `Registry` and `PackageManager` traits
//!   plus in-memory fakes (`test-utils` feature)
//! - [`planner`] / [`commit_analyzer`] - what to release
//! - [`pipeline`] - how to publish it
//! - [`orchestrator`] - the prepare, release and publish flows for one
//!   configured workspace
//! - [`rollback`] - undoing a release
//!
//! # Example
//!
//! ```rust,ignore
//! use releasekit_release::{OrchestratorConfig, ReleaseConfig, ReleaseOrchestrator};
//! use std::path::Path;
//!
//! let config = ReleaseConfig::load(Path::new("releasekit.toml"))?;
//! let settings = OrchestratorConfig::new(&config, "py", Path::new("."))?.with_dry_run(true);
//! let orchestrator = ReleaseOrchestrator::new(settings, backends);
//! println!("{}", orchestrator.plan().await?.render_table());
//! ```

pub mod backends;
pub mod changeset;
pub mod checksum;
pub mod commit_analyzer;
pub mod config;
pub mod conventional;
pub mod error;
pub mod lock;
pub mod manifest;
pub mod orchestrator;
pub mod pin;
pub mod pipeline;
pub mod planner;
pub mod process;
pub mod retry;
pub mod rollback;
pub mod version;

// Re-export main types
pub use backends::{
    Capability, CommandOutput, CommitRecord, Forge, NoForge, PackageManager, PrState, PullRequest,
    PullRequestDraft, Registry, ReleaseDraft, Vcs,
};
pub use changeset::{BumpType, Changeset, ChangesetStore};
pub use config::{ForgeKind, PublishSettings, ReleaseConfig, TagFormat, WorkspaceConfig};
pub use conventional::{CommitParser, OpenParser, ParsedCommit, StrictParser};
pub use error::{Error, Result};
pub use lock::ReleaseLock;
pub use manifest::ReleaseManifest;
pub use orchestrator::{
    Backends, OrchestratorConfig, PrepareReport, ReleaseOrchestrator, ReleaseReport,
};
pub use pin::EphemeralPin;
pub use pipeline::{PublishConfig, PublishPipeline, PublishReport, PublishResult, PublishStatus};
pub use planner::{PlanOptions, PlanReason, ReleasePlan, ReleasePlanEntry, plan};
pub use process::Cmd;
pub use retry::RetryPolicy;
pub use rollback::{RollbackEngine, RollbackOutcome};
pub use version::{PropagationPolicy, VersioningScheme, next_version};
