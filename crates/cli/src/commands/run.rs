//! `recon run` - execute the two-phase batch over a dataset.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use recon_pipeline::{JobConfig, job};

use crate::dataset::Dataset;
use crate::error::CliError;

/// Load the dataset, run the batch, and print the job summary as JSON.
///
/// # Errors
///
/// Returns an error for configuration, dataset, or job-scope failures;
/// per-order and per-shipment failures are absorbed into the audit counts.
pub async fn execute(path: &Path, pretty: bool) -> Result<(), CliError> {
    let config = JobConfig::from_env()?;
    let dataset = Dataset::load(path)?;
    info!(
        orders = dataset.orders.len(),
        locations = dataset.locations.len(),
        candidates = dataset.candidate_ids().len(),
        "dataset loaded"
    );

    let store = Arc::new(dataset.into_store(&config.seed_search_id));
    let summary = job::run(store, config).await?;

    let rendered = if pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    emit(&rendered);
    Ok(())
}

// Summary JSON is the command's output contract, so it goes to stdout.
#[allow(clippy::print_stdout)]
fn emit(rendered: &str) {
    println!("{rendered}");
}
