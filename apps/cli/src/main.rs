//! LeadCascade CLI: cascade contact enrichment from the command line.
//!
//! Reads contacts from a JSON file, runs them through the provider cascade
//! and both verifiers, and writes the enrichment results as JSON.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
