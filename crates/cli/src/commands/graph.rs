use super::{Outcome, heading};
use crate::cli::{CliError, CommonArgs, GraphFormat};
use crate::context::Context;
use std::fmt::Write as _;

pub fn run(
    ctx: &Context,
    labels: &[String],
    common: &CommonArgs,
    format: GraphFormat,
) -> Result<Outcome, CliError> {
    let mut out = String::new();
    for label in labels {
        let graph = ctx.orchestrator(label, common)?.graph()?;
        match format {
            GraphFormat::Dot => out.push_str(&graph.to_dot()),
            GraphFormat::Levels => {
                out.push_str(&heading(label));
                let levels = graph.publish_levels().map_err(releasekit_release::Error::from)?;
                for (index, level) in levels.iter().enumerate() {
                    let _ = writeln!(out, "  level {index}: {}", level.join(", "));
                }
            }
        }
    }
    Ok(Outcome::ok(out))
}
