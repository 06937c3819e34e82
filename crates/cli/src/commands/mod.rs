//! Subcommand implementations.
//!
//! Every command runs once per selected workspace and returns its printable
//! output; `main` decides where it goes.

mod discover;
mod graph;
mod plan;
mod prepare;
mod publish;
mod release;
mod rollback;

use crate::cli::{Cli, CliError, Commands};
use crate::context::Context;
use tracing::info;

/// Printable result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Text for stdout.
    pub output: String,
    /// Whether the process should exit 0.
    pub success: bool,
}

impl Outcome {
    /// A successful outcome.
    #[must_use]
    pub const fn ok(output: String) -> Self {
        Self { output, success: true }
    }
}

/// Run the parsed command.
///
/// # Errors
///
/// Returns configuration and release errors; a failed publish is reported
/// through [`Outcome::success`] instead.
pub async fn execute(cli: Cli) -> Result<Outcome, CliError> {
    let mut ctx = Context::load(&cli.config)?;
    let common = cli.command.common().clone();
    ctx.apply_overrides(&common);
    let labels = ctx.labels(&common)?;
    info!(command = cli.command.name(), workspaces = ?labels, "Running");

    match cli.command {
        Commands::Discover { json, .. } => discover::run(&ctx, &labels, &common, json),
        Commands::Graph { format, .. } => graph::run(&ctx, &labels, &common, format),
        Commands::Plan { json, .. } => plan::run(&ctx, &labels, &common, json).await,
        Commands::Prepare { .. } => prepare::run(&ctx, &labels, &common).await,
        Commands::Release { .. } => release::run(&ctx, &labels, &common).await,
        Commands::Publish { json, .. } => publish::run(&ctx, &labels, &common, json).await,
        Commands::Rollback { tag, yank, .. } => {
            rollback::run(&ctx, &labels, &common, &tag, yank).await
        }
    }
}

/// Header line for a workspace section.
fn heading(label: &str) -> String {
    format!("[{label}]\n")
}
