//! recon - operational harness for the order/fulfillment reconciliation
//! batch.
//!
//! # Usage
//!
//! ```bash
//! # Run the two-phase batch over a JSON dataset
//! RECON_SEED_SEARCH_ID=mig-orders RECON_REVERSAL_ACCOUNT_ID=9001 \
//!     recon run --dataset fixtures/batch.json
//!
//! # Validate and describe a dataset without running
//! recon inspect --dataset fixtures/batch.json
//! ```
//!
//! # Commands
//!
//! - `run` - Load the dataset into the in-memory backend, run the batch,
//!   and emit the job summary as JSON on stdout
//! - `inspect` - Parse the dataset and report order/line counts

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod dataset;
mod error;

#[derive(Parser)]
#[command(name = "recon")]
#[command(author, version, about = "Order/fulfillment reconciliation tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the two-phase reconciliation batch over a dataset
    Run {
        /// Path to the JSON dataset file
        #[arg(short, long)]
        dataset: PathBuf,

        /// Pretty-print the summary JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Validate and describe a dataset without running the batch
    Inspect {
        /// Path to the JSON dataset file
        #[arg(short, long)]
        dataset: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before reading configuration
    dotenvy::dotenv().ok();

    // Initialize tracing with EnvFilter; defaults to info level for our
    // crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "recon=info,recon_pipeline=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { dataset, pretty } => commands::run::execute(&dataset, pretty).await,
        Commands::Inspect { dataset } => commands::inspect::execute(&dataset),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}
