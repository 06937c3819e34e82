use super::Outcome;
use crate::cli::{CliError, CommonArgs};
use crate::context::Context;
use releasekit_release::{
    ReleaseLock, ReleaseManifest, RollbackEngine, RollbackOutcome, TagFormat,
};
use releasekit_vcs::GitCli;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

pub async fn run(
    ctx: &Context,
    labels: &[String],
    common: &CommonArgs,
    tag: &str,
    yank: bool,
) -> Result<Outcome, CliError> {
    let manifest = ReleaseManifest::read(&ctx.config.manifest_file(&ctx.repo_root))?;

    let mut chosen = None;
    for label in labels {
        let engine = engine_for(ctx, label, common.dry_run)?;
        if !engine.resolve(tag, manifest.as_ref()).is_empty() {
            debug!(workspace = %label, tag, "Tag belongs to workspace");
            chosen = Some(engine);
            break;
        }
    }
    let engine = match (chosen, labels.first()) {
        (Some(engine), _) => engine,
        (None, Some(label)) => engine_for(ctx, label, common.dry_run)?,
        (None, None) => return Err(CliError::config("No workspaces configured")),
    };

    let outcome = engine.rollback(tag, manifest.as_ref(), yank).await?;
    Ok(Outcome::ok(render(&outcome)))
}

fn engine_for(ctx: &Context, label: &str, dry_run: bool) -> Result<RollbackEngine, CliError> {
    let ws = ctx.config.workspace(label)?;
    let backends = ctx.backends(label)?;
    Ok(RollbackEngine::new(
        Arc::new(GitCli::new(&ctx.repo_root)),
        backends.forge,
        backends.registry,
        TagFormat::new(&ws.tag_format)?,
    )
    .with_lock(ReleaseLock::new(&ctx.repo_root))
    .with_manifest_file(
        ctx.config.manifest_file(&ctx.repo_root),
        ws.ecosystem()?,
    )
    .with_dry_run(dry_run))
}

fn render(outcome: &RollbackOutcome) -> String {
    let mut out = String::new();
    match outcome {
        RollbackOutcome::NoOp { tag } => {
            let _ = writeln!(out, "{tag} does not exist; nothing to roll back");
        }
        RollbackOutcome::RolledBack {
            tag,
            packages,
            deleted_tags,
            deleted_releases,
            yanked,
            not_yanked,
        } => {
            let _ = writeln!(out, "Rolled back {tag}");
            for package in packages {
                let _ = writeln!(out, "  {} {}", package.name, package.version);
            }
            for (what, items) in [
                ("deleted tag", deleted_tags),
                ("deleted release", deleted_releases),
                ("yanked", yanked),
                ("could not yank", not_yanked),
            ] {
                for item in items {
                    let _ = writeln!(out, "  {what} {item}");
                }
            }
        }
    }
    out
}
