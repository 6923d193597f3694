use clap::Parser;
use compressio_client::cli::{self, Cli};
use compressio_client::logging;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    // Logging is best effort; the command still runs without a log file
    if let Err(e) = logging::init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            cli::report_error(&e);
            ExitCode::FAILURE
        }
    }
}
