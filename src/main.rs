use clap::Parser;
use script_bridge::cli::{run, Cli};
use script_bridge::core::init_logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let sinks = init_logging(&config.logging, cli.verbose);
    tracing::debug!(target: "script_host", file = sinks.file, console = sinks.console, "Logging ready");

    match run(&cli, &config) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(target: "script_host", "{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
