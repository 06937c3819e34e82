//! `releasekit` binary entry point.

use releasekit_cli::cli::{self, EXIT_CLI, EXIT_FAILURE, EXIT_OK, exit_code_for, render_error};
use releasekit_cli::commands::execute;
use releasekit_cli::tracing::{TracingConfig, init_tracing};
use std::io::Write as _;

fn main() {
    // Tracing may not be usable while panicking.
    #[allow(clippy::print_stderr)]
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("releasekit panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RELEASEKIT_LOG=debug for more information.");
    }));

    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: cli.log_format,
        level: cli.log_level.into(),
        filter: None,
    };
    if let Err(e) = init_tracing(tracing_config) {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Error: {e:?}");
        }
        std::process::exit(EXIT_CLI);
    }

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            }
            std::process::exit(EXIT_FAILURE);
        }
    };

    let exit_code = match rt.block_on(execute(cli)) {
        Ok(outcome) => {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(outcome.output.as_bytes());
            if !outcome.output.is_empty() && !outcome.output.ends_with('\n') {
                let _ = stdout.write_all(b"\n");
            }
            let _ = stdout.flush();
            if outcome.success { EXIT_OK } else { EXIT_FAILURE }
        }
        Err(err) => {
            let code = exit_code_for(&err);
            render_error(err);
            code
        }
    };
    std::process::exit(exit_code);
}
