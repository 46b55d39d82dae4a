/// CLI Module
///
/// Command-line interface configuration using clap.
use clap::Parser;
use std::path::PathBuf;

use crate::config::DbConfig;

/// Star Schema Loader - ETL Pipeline
///
/// Rebuild a product/sales star schema and fill it with synthetic sales
#[derive(Parser, Debug)]
#[command(name = "star-schema-loader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database server as host or host:port (overrides DB_SERVER env var)
    #[arg(short = 's', long, value_name = "ADDRESS")]
    pub server: Option<String>,

    /// Database name (overrides DB_NAME env var)
    #[arg(short = 'd', long, value_name = "NAME")]
    pub database: Option<String>,

    /// Database user (overrides DB_USER env var)
    #[arg(short = 'u', long, value_name = "USER")]
    pub username: Option<String>,

    /// Log file, appended to on every run
    #[arg(short = 'l', long, value_name = "PATH", default_value = "sales_pipeline.log")]
    pub log_file: PathBuf,

    /// Seed for the sales generator (random when omitted)
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

impl Cli {
    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.log_file.as_os_str().is_empty() {
            anyhow::bail!("Log file path must not be empty");
        }

        Ok(())
    }

    /// Apply command-line overrides on top of the environment configuration
    pub fn apply_overrides(&self, mut config: DbConfig) -> DbConfig {
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(username) = &self.username {
            config.username = username.clone();
        }

        config
    }
}
