//! stagepush binary entry point.

use std::process::ExitCode;

use stagepush::cli::{self, Cli};
use stagepush::ui::output;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Cli::parse_args();
    init_tracing(args.debug);

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr. `STAGEPUSH_LOG` takes an `EnvFilter` directive;
/// `--debug` overrides it.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("stagepush=debug")
    } else {
        EnvFilter::try_from_env("STAGEPUSH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
