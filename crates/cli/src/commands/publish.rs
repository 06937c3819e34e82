use super::{Outcome, heading};
use crate::cli::{CliError, CommonArgs};
use crate::context::Context;
use releasekit_release::PublishReport;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub async fn run(
    ctx: &Context,
    labels: &[String],
    common: &CommonArgs,
    json: bool,
) -> Result<Outcome, CliError> {
    ctx.check_publish_origin();
    let mut reports = BTreeMap::new();
    for label in labels {
        let report = ctx.orchestrator(label, common)?.publish().await?;
        reports.insert(label.as_str(), report);
    }
    let success = reports.values().all(PublishReport::is_success);
    let output = if json {
        serde_json::to_string_pretty(&reports)?
    } else {
        let mut out = String::new();
        for (label, report) in &reports {
            out.push_str(&heading(label));
            out.push_str(&render(report));
        }
        out
    };
    Ok(Outcome { output, success })
}

fn render(report: &PublishReport) -> String {
    if report.results.is_empty() && report.blocked.is_empty() {
        return "  Nothing to publish\n".to_string();
    }
    let width = report.results.iter().map(|r| r.package.len()).max().unwrap_or(0);
    let mut out = String::new();
    for result in &report.results {
        let _ = write!(out, "  {:width$}  {:<9} {}", result.package, result.status, result.version);
        if result.attempts > 1 {
            let _ = write!(out, "  ({} attempts)", result.attempts);
        }
        if let Some(error) = &result.error {
            let _ = write!(out, "  {error}");
        }
        out.push('\n');
        for warning in &result.warnings {
            let _ = writeln!(out, "    warning: {warning}");
        }
    }
    for name in &report.blocked {
        let _ = writeln!(out, "  {name:width$}  blocked");
    }
    out
}
