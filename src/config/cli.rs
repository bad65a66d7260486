use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, validate_path, Validate};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "db-csv-batch")]
#[command(about = "Batch jobs that move member records between CSV files and the database")]
pub struct CliConfig {
    /// Job to run: CSV_TO_DB or DB_TO_CSV
    #[arg(short, long, env = "BATCH_JOB_NAME")]
    pub job: String,

    /// Path to TOML configuration file
    #[arg(short, long, default_value = "batch.toml", env = "BATCH_CONFIG")]
    pub config: PathBuf,

    /// Override csv_to_db.source_path
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Override db_to_csv.destination_path
    #[arg(long)]
    pub destination: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("job", &self.job)?;
        validate_path("config", &self.config.to_string_lossy())?;
        if let Some(source) = &self.source {
            validate_path("source", &source.to_string_lossy())?;
        }
        if let Some(destination) = &self.destination {
            validate_path("destination", &destination.to_string_lossy())?;
        }
        Ok(())
    }
}
