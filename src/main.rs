use clap::Parser;
use chart_injector::cli::Cli;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    if let Err(e) = chart_injector::run_command(cli.command, cli.config.as_deref()).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
