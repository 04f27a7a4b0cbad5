//! great_expectations command line entry point

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use error_handling::{init_logging, LoggingConfig};
use ge_cli::commands;
use ge_cli::Cli;

/// Upper bound on waiting for blocking work (such as DNS lookups) once the
/// command has returned
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(100);

/// Exit status after SIGINT, as a shell reports it
const SIGINT_EXIT_CODE: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(Some(LoggingConfig::default().verbose(cli.verbose))) {
        eprintln!("Warning: logging unavailable: {}", e);
    }

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(commands::run(cli));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", commands::error_message(&e));
            if e.is_interrupt() {
                ExitCode::from(SIGINT_EXIT_CODE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("unable to start the async runtime")
}
