use anyhow::Context;
use clap::Parser;
use agui_cli::{cli::Cli, config, run_command};
use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    // Load configuration
    let config = config::load_config(cli.config.as_deref())
        .context("failed to load configuration")?;

    run_command(cli.command, config, cli.json).await?;
    Ok(())
}
