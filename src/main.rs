// ABOUTME: Entry point for the rollsafe CLI application.
// ABOUTME: Parses arguments, runs one deployment and maps its outcome to an exit code.

mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use rollsafe::deploy::Outcome;
use rollsafe::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise the verbose flag picks the level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    let code = match commands::deploy(&cli, &mut output).await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            output.error(&e.to_string());
            Outcome::AbortedBeforeMutation.exit_code()
        }
    };

    std::process::exit(code);
}
