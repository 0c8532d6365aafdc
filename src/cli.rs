use clap::{Parser, Subcommand};

use crate::commands;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "pricewatch")]
#[command(about = "Price sampler, dashboard and threshold email alerts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the dashboard server with the collector, alert and digest workers
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Fetch current prices once and store them
    Collect {
        /// Also fetch bond yields from Perplexity
        #[arg(long)]
        bonds: bool,
    },
    /// Run one alert evaluation now
    Check {
        /// Log the alert emails instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Show stored data, parameters and configuration
    Status,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await,
        Commands::Collect { bonds } => commands::collect::run(bonds).await,
        Commands::Check { dry_run } => commands::check::run(dry_run).await,
        Commands::Status => commands::status::run().await,
    }
}
