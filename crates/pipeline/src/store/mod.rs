//! Persistence seams for the pipeline's external collaborators.
//!
//! The order, shipment, reversal, and location stores - and the seed dataset
//! - live outside this subsystem. Each is reached through an async trait so
//! a stage invocation suspends only on store I/O; backends provide
//! last-write-wins persistence per document with no multi-document
//! transaction. [`MemoryStore`] is the bundled backend for tests and the
//! CLI harness.

use async_trait::async_trait;
use thiserror::Error;

use recon_core::{
    InventoryReversal, LocationId, LocationRecord, Order, OrderId, ReversalId, Shipment,
    ShipmentId,
};

pub mod memory;

pub use memory::MemoryStore;

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested document does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// The backend failed to complete the operation.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Shorthand for a missing document.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Read/write access to order documents.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Load one order.
    async fn load_order(&self, id: OrderId) -> Result<Order, StoreError>;

    /// Save an order, replacing the persisted document.
    async fn save_order(&self, order: &Order) -> Result<(), StoreError>;
}

/// Create/read/write access to shipment documents.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Derive a new, unsaved shipment for one order and location,
    /// pre-populated with a candidate line for every still-open order
    /// quantity regardless of location.
    async fn derive_shipment(
        &self,
        order: OrderId,
        location: LocationId,
    ) -> Result<Shipment, StoreError>;

    /// Persist a new shipment and return its assigned identifier.
    async fn create_shipment(&self, shipment: &Shipment) -> Result<ShipmentId, StoreError>;

    /// Load one shipment.
    async fn load_shipment(&self, id: ShipmentId) -> Result<Shipment, StoreError>;

    /// Save an already-created shipment, replacing the persisted document.
    async fn update_shipment(&self, shipment: &Shipment) -> Result<(), StoreError>;
}

/// Create access to inventory reversal documents.
#[async_trait]
pub trait ReversalStore: Send + Sync {
    /// Persist a new reversal document and return its assigned identifier.
    async fn create_reversal(&self, reversal: &InventoryReversal)
    -> Result<ReversalId, StoreError>;
}

/// Read access to location records.
#[async_trait]
pub trait LocationDirectory: Send + Sync {
    /// Load one location record.
    async fn load_location(&self, id: LocationId) -> Result<LocationRecord, StoreError>;
}

/// The seed dataset boundary: a row-set of candidate order identifiers.
#[async_trait]
pub trait SeedSource: Send + Sync {
    /// Candidate orders produced by the named saved search.
    async fn candidate_orders(&self, search_id: &str) -> Result<Vec<OrderId>, StoreError>;
}

/// Everything the batch runner needs from one backend.
pub trait Stores:
    OrderStore + ShipmentStore + ReversalStore + LocationDirectory + SeedSource
{
}

impl<T> Stores for T where
    T: OrderStore + ShipmentStore + ReversalStore + LocationDirectory + SeedSource
{
}
