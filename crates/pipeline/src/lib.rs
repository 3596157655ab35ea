//! Recon Pipeline - Two-phase reconciliation of migrated orders.
//!
//! The pipeline reconciles migrated customer orders with their physical
//! fulfillment in two phases plus an observability pass:
//!
//! 1. [`stages::grouping`] ("map") - per candidate order: best-effort tax
//!    reallocation, then grouping of eligible unfulfilled lines by shipping
//!    location, creating one shipment per location and matching lines by the
//!    stable line-correlation key.
//! 2. [`stages::reversal`] ("reduce") - per created shipment: posting of the
//!    compensating inventory reversal and flipping of the idempotency flags
//!    on both the shipment and the originating order lines.
//! 3. [`stages::audit`] ("summarize") - classification of both stages' error
//!    streams into aggregate counts.
//!
//! Invocations are independent and unordered; each touches only its own
//! order or shipment. Correctness across retries relies on the persisted
//! idempotency flags rather than any cross-invocation coordination, so a
//! partially processed batch is simply resumable: untouched lines and
//! shipments remain eligible for the next run.
//!
//! Persistence is reached exclusively through the [`store`] traits; the
//! bundled [`store::MemoryStore`] backs tests and the CLI harness.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod job;
pub mod stages;
pub mod store;

pub use config::{ConfigError, JobConfig};
pub use error::{ErrorRecord, JobError, Stage, StageError};
pub use job::JobSummary;
pub use stages::audit::AuditSummary;
pub use stages::grouping::{MatchedLine, ShipmentWork};
pub use store::{
    LocationDirectory, MemoryStore, OrderStore, ReversalStore, SeedSource, ShipmentStore,
    StoreError, Stores,
};
