//! Unified error handling for the CLI.

use thiserror::Error;

use recon_pipeline::{ConfigError, JobError};

/// Application-level error type for the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Dataset file could not be read.
    #[error("dataset read error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON could not be parsed or rendered.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The batch job failed at job scope.
    #[error("job error: {0}")]
    Job(#[from] JobError),
}
