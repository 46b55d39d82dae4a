/// Star Schema Loader
///
/// An ETL pipeline that rebuilds a product/sales star schema and seeds it
/// with synthetic sales data for demos and tests.
mod cli;
mod config;
mod db;
mod etl;
mod logging;
mod models;
mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use cli::Cli;
use config::DbConfig;
use pipeline::{Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    cli.validate()?;

    // Held until main returns so buffered log lines are flushed
    let _log_guard = logging::init(&cli.log_file)
        .with_context(|| format!("Failed to open log file {}", cli.log_file.display()))?;

    tracing::info!("--- Starting ETL process ---");
    println!("🚀 Starting Star Schema Loader...");

    let db_config = cli.apply_overrides(DbConfig::from_env());
    tracing::debug!("Database configuration: {:?}", db_config);
    println!("💾 Connecting to {} (database '{}')...", db_config.server, db_config.database);

    let mut pipeline = Pipeline::new(PipelineConfig { seed: cli.seed, ..PipelineConfig::default() });

    let outcome = pipeline.execute(&db_config).await;
    tracing::debug!("Pipeline finished in state {:?}", pipeline.state());

    match outcome {
        Ok(stats) => {
            stats.print_summary();
            println!("\n✨ Process finished! Check the file '{}'.", cli.log_file.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!(
                "\n❌ An error occurred in the {} stage. Check the log at '{}'.",
                e.stage(),
                cli.log_file.display()
            );
            if e.is_connection() {
                println!("   Verify DB_SERVER, DB_NAME, DB_USER and DB_PASSWORD in your environment or .env file.");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
