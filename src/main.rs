//! tabfit - Main Entry Point
//!
//! Batch model selection for tabular regression.

use clap::Parser;
use tabfit::cli::Cli;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabfit=info".into()),
        )
        .init();

    let cli = Cli::parse();
    cli.execute()
}
