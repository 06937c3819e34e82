//! Package manager drivers for releasekit.
//!
//! Every driver implements [`releasekit_release::PackageManager`] by running
//! the ecosystem's own tool through [`releasekit_release::Cmd`]. A non-zero
//! exit is returned as an unsuccessful [`CommandOutput`], never an `Err`.
//!
//! | Ecosystem  | Driver         | Build artifacts         |
//! |------------|----------------|-------------------------|
//! | Rust       | [`Cargo`]      | `.crate`                |
//! | JavaScript | [`NodeTool`]   | `.tgz` (pnpm or npm)    |
//! | Python     | [`Uv`]         | sdist and wheels        |
//! | Go         | [`GoTool`]     | none (tags publish)     |
//! | Dart       | [`DartPub`]    | none                    |

pub mod cargo;
pub mod dart;
pub mod go;
pub mod node;
pub mod python;
mod util;

pub use cargo::Cargo;
pub use dart::DartPub;
pub use go::GoTool;
pub use node::{NodeClient, NodeTool};
pub use python::Uv;

use releasekit_release::{CommandOutput, Error, PackageManager, Result};
use releasekit_workspaces::Ecosystem;
use std::sync::Arc;

/// The driver for `ecosystem`. `tool` picks between alternatives
/// (`pnpm` or `npm` for JavaScript) and must otherwise match the default.
///
/// # Errors
///
/// Returns [`Error::Config`] for a tool the ecosystem has no driver for.
pub fn package_manager_for(
    ecosystem: Ecosystem,
    tool: Option<&str>,
) -> Result<Arc<dyn PackageManager>> {
    let manager: Arc<dyn PackageManager> = match (ecosystem, tool) {
        (Ecosystem::Rust, None | Some("cargo")) => Arc::new(Cargo::new()),
        (Ecosystem::JavaScript, None | Some("pnpm")) => Arc::new(NodeTool::new(NodeClient::Pnpm)),
        (Ecosystem::JavaScript, Some("npm")) => Arc::new(NodeTool::new(NodeClient::Npm)),
        (Ecosystem::Python, None | Some("uv")) => Arc::new(Uv::new()),
        (Ecosystem::Go, None | Some("go")) => Arc::new(GoTool::new()),
        (Ecosystem::Dart, None | Some("dart" | "pub")) => Arc::new(DartPub::new()),
        (ecosystem, Some(other)) => {
            return Err(Error::config(
                format!("no {other} driver for {ecosystem} workspaces"),
                supported_tools(ecosystem),
            ));
        }
    };
    Ok(manager)
}

fn supported_tools(ecosystem: Ecosystem) -> String {
    let tools = match ecosystem {
        Ecosystem::Rust => "cargo",
        Ecosystem::JavaScript => "pnpm, npm",
        Ecosystem::Python => "uv",
        Ecosystem::Go => "go",
        Ecosystem::Dart => "dart",
    };
    format!("Supported tools for {ecosystem}: {tools}")
}

/// Output for a tool that has no version-setting command.
fn no_version_command(tool: &str) -> CommandOutput {
    CommandOutput {
        success: false,
        exit_code: None,
        stderr: format!("{tool} has no version command"),
        ..CommandOutput::default()
    }
}
