mod commands;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use css_reports_lib::ReportsConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "css-reports")]
#[command(about = "Fetch product reports from the Guild of Students admin portal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one filtered report
    Fetch(commands::fetch::FetchArgs),
    /// Serve reports over HTTP
    Serve(commands::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter()?)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ReportsConfig::from_env();

    match &cli.command {
        Commands::Fetch(args) => commands::fetch::run(args, &config).await?,
        Commands::Serve(args) => commands::serve::run(args, &config).await?,
    }

    Ok(())
}

/// `RUST_LOG` plus info-level defaults for this workspace's crates.
fn env_filter() -> Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["css_reports=info", "guild_portal=info"] {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}
