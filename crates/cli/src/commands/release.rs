use super::{Outcome, heading};
use crate::cli::{CliError, CommonArgs};
use crate::context::Context;
use std::fmt::Write as _;

pub async fn run(
    ctx: &Context,
    labels: &[String],
    common: &CommonArgs,
) -> Result<Outcome, CliError> {
    if !common.dry_run {
        ctx.check_forge().await?;
    }
    let mut out = String::new();
    for label in labels {
        let report = ctx.orchestrator(label, common)?.release().await?;
        out.push_str(&heading(label));
        match report.pull_request {
            Some(number) => {
                let _ = writeln!(out, "  pull request: #{number}");
            }
            None if report.tags_created.is_empty() && report.tags_existing.is_empty() => {
                out.push_str("  No merged release pull request\n");
                continue;
            }
            None => {}
        }
        for tag in &report.tags_created {
            let _ = writeln!(out, "  tagged {tag}");
        }
        for tag in &report.tags_existing {
            let _ = writeln!(out, "  {tag} already exists");
        }
        for release in &report.releases_created {
            let _ = writeln!(out, "  released {release}");
        }
        if report.changesets_consumed > 0 {
            let _ = writeln!(out, "  consumed {} changesets", report.changesets_consumed);
        }
    }
    Ok(Outcome::ok(out))
}
