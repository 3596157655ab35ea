//! Batch runner: map, regroup, reduce, audit.
//!
//! Stands in for the host batch framework: dispatches the grouping stage
//! once per candidate order and the reversal stage once per created
//! shipment, each on its own task with no ordering guarantee and no shared
//! mutable state beyond the store handles. A unit failure never halts the
//! batch; only job-scope configuration errors (and a failed seed fetch)
//! terminate the run.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use recon_core::ShipmentId;

use crate::config::{ConfigError, JobConfig};
use crate::error::{ErrorRecord, JobError};
use crate::stages::audit::{self, AuditSummary};
use crate::stages::grouping::{self, ShipmentWork};
use crate::stages::reversal;
use crate::store::Stores;

/// Outcome of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    /// Identifier tagging this run's log records.
    pub run_id: Uuid,
    /// Candidate orders dispatched to the grouping stage.
    pub orders_seen: usize,
    /// Shipments created by the grouping stage.
    pub shipments_created: usize,
    /// Inventory reversals posted by the reversal stage.
    pub reversals_created: usize,
    /// Aggregate error counts from both stages.
    pub audit: AuditSummary,
}

/// Run the full two-phase reconciliation batch.
///
/// # Errors
///
/// Fails only on a blank seed search identifier or a failed seed dataset
/// fetch; unit failures are absorbed into the audit stream.
#[instrument(skip(store, config), fields(seed = %config.seed_search_id))]
pub async fn run<S>(store: Arc<S>, config: JobConfig) -> Result<JobSummary, JobError>
where
    S: Stores + ?Sized + 'static,
{
    if config.seed_search_id.trim().is_empty() {
        return Err(ConfigError::MissingSeedSearch.into());
    }
    let run_id = Uuid::new_v4();
    let candidates = store.candidate_orders(&config.seed_search_id).await?;
    info!(run = %run_id, candidates = candidates.len(), "reconciliation batch starting");

    let mut errors: Vec<ErrorRecord> = Vec::new();

    // Map: one grouping invocation per candidate order.
    let mut map_tasks = JoinSet::new();
    for order_id in &candidates {
        let store = Arc::clone(&store);
        let order_id = *order_id;
        map_tasks.spawn(async move { grouping::process_order(store.as_ref(), order_id).await });
    }

    // Regroup emitted pairs by shipment id. One output per key is the
    // designed case; extras are dropped with a warning.
    let mut work_by_shipment: HashMap<ShipmentId, ShipmentWork> = HashMap::new();
    while let Some(joined) = map_tasks.join_next().await {
        match joined {
            Ok((outputs, stage_errors)) => {
                errors.extend(stage_errors);
                for (shipment_id, work) in outputs {
                    if work_by_shipment.contains_key(&shipment_id) {
                        warn!(shipment = %shipment_id, "duplicate map output for shipment, keeping first");
                        continue;
                    }
                    work_by_shipment.insert(shipment_id, work);
                }
            }
            Err(e) => error!(error = %e, "grouping task aborted"),
        }
    }
    let shipments_created = work_by_shipment.len();

    // Reduce: one reversal invocation per created shipment.
    let config = Arc::new(config);
    let mut reduce_tasks = JoinSet::new();
    for (shipment_id, work) in work_by_shipment {
        let store = Arc::clone(&store);
        let config = Arc::clone(&config);
        reduce_tasks.spawn(async move {
            reversal::process_shipment(store.as_ref(), &config, shipment_id, &work).await
        });
    }

    let mut reversals_created = 0;
    while let Some(joined) = reduce_tasks.join_next().await {
        match joined {
            Ok((outcome, stage_errors)) => {
                errors.extend(stage_errors);
                if outcome.is_some() {
                    reversals_created += 1;
                }
            }
            Err(e) => error!(error = %e, "reversal task aborted"),
        }
    }

    let audit = audit::summarize(run_id, &errors);
    info!(
        run = %run_id,
        orders = candidates.len(),
        shipments = shipments_created,
        reversals = reversals_created,
        "reconciliation batch complete"
    );

    Ok(JobSummary {
        run_id,
        orders_seen: candidates.len(),
        shipments_created,
        reversals_created,
        audit,
    })
}
