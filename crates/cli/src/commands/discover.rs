use super::{Outcome, heading};
use crate::cli::{CliError, CommonArgs};
use crate::context::Context;
use releasekit_workspaces::Package;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub fn run(
    ctx: &Context,
    labels: &[String],
    common: &CommonArgs,
    json: bool,
) -> Result<Outcome, CliError> {
    let mut found: BTreeMap<&str, Vec<Package>> = BTreeMap::new();
    for label in labels {
        let packages = ctx.orchestrator(label, common)?.discover()?;
        found.insert(label.as_str(), packages);
    }
    if json {
        return Ok(Outcome::ok(serde_json::to_string_pretty(&found)?));
    }

    let mut out = String::new();
    for (label, packages) in &found {
        out.push_str(&heading(label));
        if packages.is_empty() {
            out.push_str("  (no packages)\n");
        }
        for package in packages {
            let _ = write!(
                out,
                "  {} {} {}",
                package.name,
                package.version,
                package.path.display()
            );
            if !package.publishable {
                out.push_str(" (private)");
            }
            out.push('\n');
        }
    }
    Ok(Outcome::ok(out))
}
