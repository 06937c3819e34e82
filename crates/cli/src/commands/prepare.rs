use super::{Outcome, heading, plan::render};
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
        let report = ctx.orchestrator(label, common)?.prepare().await?;
        out.push_str(&heading(label));
        out.push_str(&render(&report.plan));
        if report.plan.is_empty() {
            continue;
        }
        let _ = writeln!(out, "  branch: {}", report.branch);
        if let Some(number) = report.pull_request {
            let _ = writeln!(out, "  pull request: #{number}");
        }
    }
    Ok(Outcome::ok(out))
}
