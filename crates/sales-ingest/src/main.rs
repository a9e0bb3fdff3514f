//! Sales Ingest - dry-run ingestion tool
//!
//! Runs the ingestion pipeline against an in-memory store so a CSV file can
//! be checked without touching the database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use sales_common::logging::{init_logging, LogConfig, LogLevel};
use sales_ingest::{IngestionPipeline, MemoryStore};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sales-ingest")]
#[command(author, version, about = "Sales CSV ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a file into memory and report what would be loaded
    Check {
        /// CSV file to ingest
        file: PathBuf,

        /// Number of concurrent workers
        #[arg(short, long, default_value_t = 4, env = "WORKER_POOL_SIZE")]
        workers: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("sales-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Check { file, workers } => check(file, workers).await,
    }
}

async fn check(file: PathBuf, workers: usize) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestionPipeline::new(store.clone(), store.clone(), workers)?;

    info!(file = %file.display(), workers, "Checking file");
    let record = pipeline.run(&file).await?;
    let counts = store.counts();

    println!("run:        {}", record.id);
    println!("status:     {}", record.status);
    println!("rows read:  {}", record.rows_loaded);
    println!("customers:  {}", counts.customers);
    println!("products:   {}", counts.products);
    println!("orders:     {}", counts.orders);
    println!("duration:   {} ms", record.duration().num_milliseconds());

    if let Some(message) = record.error_msg {
        bail!("ingestion failed: {message}");
    }
    Ok(())
}
