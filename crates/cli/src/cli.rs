//! Argument parsing, errors and exit codes.

use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::Diagnostic;
use releasekit_release::BumpType;
use releasekit_release::config::CONFIG_FILE;
use std::path::PathBuf;
use thiserror::Error;

/// Success exit code
pub const EXIT_OK: i32 = 0;
/// A release operation failed
pub const EXIT_FAILURE: i32 = 1;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("{message}")]
    #[diagnostic(code(releasekit::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },

    /// An error from the release engine
    #[error(transparent)]
    #[diagnostic(transparent)]
    Release(#[from] releasekit_release::Error),

    /// Failed to serialize command output
    #[error("Failed to render output: {0}")]
    #[diagnostic(code(releasekit::cli::output))]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text.
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<releasekit_workspaces::Error> for CliError {
    fn from(err: releasekit_workspaces::Error) -> Self {
        Self::Release(err.into())
    }
}

/// Map an error to the process exit code.
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    use releasekit_release::Error as E;
    match err {
        CliError::Config { .. }
        | CliError::Release(
            E::Config { .. }
            | E::TomlParse(_)
            | E::Workspace(_)
            | E::Graph(_)
            | E::ChangesetParse { .. }
            | E::PackageNotFound { .. },
        ) => EXIT_CLI,
        CliError::Release(_) | CliError::Output(_) => EXIT_FAILURE,
    }
}

/// Render an error with its diagnostic to stderr.
#[allow(clippy::print_stderr)]
pub fn render_error(err: CliError) {
    let report = miette::Report::new(err);
    eprintln!("{report:?}");
}

/// Release orchestration for polyglot monorepos.
#[derive(Parser, Debug)]
#[command(name = "releasekit")]
#[command(
    about = "Plan, tag and publish releases across Rust, JavaScript, Python, Go and Dart workspaces"
)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file.
    #[arg(long, short = 'c', global = true, env = "RELEASEKIT_CONFIG", default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Logging level.
    #[arg(long, short = 'l', global = true, default_value = "info", value_enum)]
    pub log_level: LogLevel,

    /// Log output format.
    #[arg(long, global = true, default_value = "pretty", value_enum)]
    pub log_format: TracingFormat,
}

/// Flags shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Run read-only steps and log intended mutations.
    #[arg(long)]
    pub dry_run: bool,

    /// Continue publishing after a failed level.
    #[arg(long)]
    pub force: bool,

    /// Only include packages in these groups.
    #[arg(long, short = 'g')]
    pub group: Vec<String>,

    /// Bump every selected package by this much.
    #[arg(long, value_parser = parse_bump)]
    pub bump_type: Option<BumpType>,

    /// Release prerelease versions with this label (e.g. `rc`).
    #[arg(long)]
    pub prerelease: Option<String>,

    /// Packages published concurrently within a level (0 = auto).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Publish retries per package.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Only operate on these workspaces (default: all).
    #[arg(long, short = 'w')]
    pub workspace: Vec<String>,
}

fn parse_bump(s: &str) -> Result<BumpType, String> {
    s.parse::<BumpType>().map_err(|e| e.to_string())
}

/// Graph output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    /// One line per publish level.
    #[default]
    Levels,
    /// Graphviz DOT.
    Dot,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List packages per workspace.
    Discover {
        /// Common flags.
        #[command(flatten)]
        common: CommonArgs,
        /// Print JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the dependency graph.
    Graph {
        /// Common flags.
        #[command(flatten)]
        common: CommonArgs,
        /// Output format.
        #[arg(long, value_enum, default_value = "levels")]
        format: GraphFormat,
    },
    /// Compute and print the release plan.
    Plan {
        /// Common flags.
        #[command(flatten)]
        common: CommonArgs,
        /// Print JSON.
        #[arg(long)]
        json: bool,
    },
    /// Bump versions on a release branch and open or update the release PR.
    Prepare {
        /// Common flags.
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Tag a merged release PR and create forge releases.
    Release {
        /// Common flags.
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Publish packages level by level and write the release manifest.
    Publish {
        /// Common flags.
        #[command(flatten)]
        common: CommonArgs,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete a release's tags and forge releases, optionally yanking.
    Rollback {
        /// Per-package or umbrella tag to roll back.
        tag: String,
        /// Also yank or deprecate the versions on their registry.
        #[arg(long)]
        yank: bool,
        /// Common flags.
        #[command(flatten)]
        common: CommonArgs,
    },
}

impl Commands {
    /// The shared flags of any command.
    #[must_use]
    pub const fn common(&self) -> &CommonArgs {
        match self {
            Self::Discover { common, .. }
            | Self::Graph { common, .. }
            | Self::Plan { common, .. }
            | Self::Prepare { common }
            | Self::Release { common }
            | Self::Publish { common, .. }
            | Self::Rollback { common, .. } => common,
        }
    }

    /// Command name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Discover { .. } => "discover",
            Self::Graph { .. } => "graph",
            Self::Plan { .. } => "plan",
            Self::Prepare { .. } => "prepare",
            Self::Release { .. } => "release",
            Self::Publish { .. } => "publish",
            Self::Rollback { .. } => "rollback",
        }
    }
}

/// Parse the process arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
