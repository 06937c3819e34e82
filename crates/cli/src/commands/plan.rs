use super::{Outcome, heading};
use crate::cli::{CliError, CommonArgs};
use crate::context::Context;
use releasekit_release::ReleasePlan;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub async fn run(
    ctx: &Context,
    labels: &[String],
    common: &CommonArgs,
    json: bool,
) -> Result<Outcome, CliError> {
    let mut plans = BTreeMap::new();
    for label in labels {
        let plan = ctx.orchestrator(label, common)?.plan().await?;
        plans.insert(label.as_str(), plan);
    }
    if json {
        return Ok(Outcome::ok(serde_json::to_string_pretty(&plans)?));
    }
    let mut out = String::new();
    for (label, plan) in &plans {
        out.push_str(&heading(label));
        out.push_str(&render(plan));
    }
    Ok(Outcome::ok(out))
}

/// Human-readable plan table.
pub fn render(plan: &ReleasePlan) -> String {
    if plan.is_empty() {
        return "  No packages to release\n".to_string();
    }
    let width = plan.entries.iter().map(|e| e.package.len()).max().unwrap_or(0);
    let mut out = String::new();
    for entry in &plan.entries {
        let _ = writeln!(
            out,
            "  {:width$}  {} -> {}  ({}, {})  {}",
            entry.package,
            entry.current_version,
            entry.new_version,
            entry.bump,
            entry.reason,
            entry.tag,
        );
    }
    if let Some(umbrella) = &plan.umbrella_tag {
        let _ = writeln!(out, "  umbrella tag: {umbrella}");
    }
    out
}
