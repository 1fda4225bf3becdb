mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "insidertrack")]
#[command(about = "Pull SEC Form 4 insider trades and enrich them with market performance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull a date range of Form 4 filings, enrich, and export CSV
    Pull(Box<commands::pull::PullArgs>),
    /// Parse a local filing document and print the extracted transactions
    Parse(commands::parse::ParseArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("insidertrack=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Pull(args) => commands::pull::run(args.as_ref()).await?,
        Commands::Parse(args) => commands::parse::run(args)?,
    }

    Ok(())
}
