// src/main.rs

use std::process::ExitCode;

use taskdag::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    // Bad flags/filters are an operator mistake, not a runtime failure;
    // they get their own exit code.
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("taskdag: failed to initialise logging: {err:#}");
        return ExitCode::from(2);
    }

    if let Err(err) = run(args).await {
        // Alternate Debug prints the full anyhow cause chain.
        eprintln!("taskdag: {err:?}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
