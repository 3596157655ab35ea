//! Error taxonomy for the reconciliation pipeline.
//!
//! Only configuration errors terminate their enclosing scope (the whole job
//! for a missing seed search, one reversal invocation for a missing
//! account). Everything else - data errors, persistence failures - is
//! logged, recorded on the stage's error stream for the audit pass, and
//! excluded from output so the affected unit stays eligible for a later run.

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Pipeline stage that emitted an error record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Grouping,
    Reversal,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grouping => write!(f, "grouping"),
            Self::Reversal => write!(f, "reversal"),
        }
    }
}

/// One entry in a stage's error stream, consumed by the audit stage.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Stage that emitted the record.
    pub stage: Stage,
    /// Entity the record is scoped to (an order or shipment id).
    pub entity: String,
    /// Free-text message; the audit stage classifies by substring.
    pub message: String,
}

impl ErrorRecord {
    /// Create a new error record.
    pub fn new(stage: Stage, entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            entity: entity.into(),
            message: message.into(),
        }
    }
}

/// Failure raised inside a single stage invocation.
///
/// Caught at the stage's top level, logged with entity context, and turned
/// into an [`ErrorRecord`]; never escalated past the invocation.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure that terminates the whole batch job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("seed dataset fetch failed: {0}")]
    Seed(#[from] StoreError),
}
