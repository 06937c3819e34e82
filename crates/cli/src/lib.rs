//! The `releasekit` command-line interface.
//!
//! The binary is a thin shell over this library:
//!
//! - [`cli`] - argument parsing, error type and exit codes
//! - [`context`] - configuration loading and backend construction
//! - [`commands`] - one module per subcommand, each returning printable
//!   output
//! - [`tracing`] - subscriber setup

pub mod cli;
pub mod commands;
pub mod context;
pub mod tracing;

pub use cli::{CliError, EXIT_CLI, EXIT_FAILURE, EXIT_OK};
pub use commands::{Outcome, execute};
pub use context::Context;
