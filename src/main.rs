//! Network Checker - Main CLI Application
//!
//! Runs one diagnostic per invocation: ping, trace, info, speed, servers or
//! config.

use clap::Parser;
use network_checker::{
    app::App,
    cli::Cli,
    config::load_config,
    error::{AppError, ErrorReporter, Result},
    logging::LogSink,
};
use std::process;

#[tokio::main]
async fn main() {
    // Set up better panic handling
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(1);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.clone())?;
    if !cli.use_colors() {
        config.enable_color = false;
    }
    colored::control::set_override(config.enable_color);

    let sink = LogSink::create(&config.log_file)?;
    let app = App::new(cli, config, Some(sink)).await?;
    app.run().await
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) | AppError::Validation(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Run `netcheck config --env-help` for the supported variables");
            eprintln!("  - Check your .env file format");
        }
        AppError::Network(_) | AppError::Timeout(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check your internet connection");
            eprintln!("  - Verify firewall settings");
        }
        AppError::Subprocess(_) => {
            eprintln!();
            eprintln!("Make sure the system ping/traceroute utilities are installed and on PATH.");
        }
        _ => {}
    }
}
