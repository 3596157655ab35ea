//! In-memory store backend.
//!
//! Backs the integration tests and the CLI harness. Documents live in
//! `Mutex`-guarded maps; identifiers for created shipments and reversals are
//! assigned monotonically. Fault switches let tests exercise the pipeline's
//! partial-failure contracts without a real backend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use recon_core::{
    InventoryReversal, LocationId, LocationRecord, Order, OrderId, ReversalId, Shipment,
    ShipmentId, ShipmentLine, ShipmentStatus,
};

use super::{
    LocationDirectory, OrderStore, ReversalStore, SeedSource, ShipmentStore, StoreError,
};

#[derive(Debug, Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    shipments: HashMap<ShipmentId, Shipment>,
    reversals: HashMap<ReversalId, InventoryReversal>,
    locations: HashMap<LocationId, LocationRecord>,
    datasets: HashMap<String, Vec<OrderId>>,
    next_shipment: i32,
    next_reversal: i32,
}

/// In-memory implementation of all store traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_location_loads: AtomicBool,
    fail_order_saves: AtomicBool,
    fail_shipment_creates: AtomicBool,
    fail_shipment_updates: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Insert or replace an order document.
    pub fn insert_order(&self, order: Order) {
        self.lock().orders.insert(order.id, order);
    }

    /// Insert or replace a location record.
    pub fn insert_location(&self, location: LocationRecord) {
        self.lock().locations.insert(location.id, location);
    }

    /// Register the candidate-order row-set for one saved search.
    pub fn register_dataset(&self, search_id: impl Into<String>, orders: Vec<OrderId>) {
        self.lock().datasets.insert(search_id.into(), orders);
    }

    /// Snapshot of one order.
    #[must_use]
    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.lock().orders.get(&id).cloned()
    }

    /// Snapshot of all shipments, ordered by identifier.
    #[must_use]
    pub fn shipments(&self) -> Vec<Shipment> {
        let inner = self.lock();
        let mut shipments: Vec<_> = inner.shipments.values().cloned().collect();
        shipments.sort_by_key(|s| s.id);
        shipments
    }

    /// Snapshot of all reversal documents, ordered by identifier.
    #[must_use]
    pub fn reversals(&self) -> Vec<InventoryReversal> {
        let inner = self.lock();
        let mut ids: Vec<_> = inner.reversals.keys().copied().collect();
        ids.sort();
        ids.iter()
            .filter_map(|id| inner.reversals.get(id).cloned())
            .collect()
    }

    /// Make location loads fail until switched back off.
    pub fn fail_location_loads(&self, on: bool) {
        self.fail_location_loads.store(on, Ordering::SeqCst);
    }

    /// Make order saves fail until switched back off.
    pub fn fail_order_saves(&self, on: bool) {
        self.fail_order_saves.store(on, Ordering::SeqCst);
    }

    /// Make shipment creates fail until switched back off.
    pub fn fail_shipment_creates(&self, on: bool) {
        self.fail_shipment_creates.store(on, Ordering::SeqCst);
    }

    /// Make shipment updates fail until switched back off.
    pub fn fail_shipment_updates(&self, on: bool) {
        self.fail_shipment_updates.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn load_order(&self, id: OrderId) -> Result<Order, StoreError> {
        self.lock()
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    async fn save_order(&self, order: &Order) -> Result<(), StoreError> {
        if self.fail_order_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("order save rejected".to_string()));
        }
        self.lock().orders.insert(order.id, order.clone());
        Ok(())
    }
}

#[async_trait]
impl ShipmentStore for MemoryStore {
    async fn derive_shipment(
        &self,
        order: OrderId,
        location: LocationId,
    ) -> Result<Shipment, StoreError> {
        let inner = self.lock();
        let order_doc = inner
            .orders
            .get(&order)
            .ok_or_else(|| StoreError::not_found("order", order))?;
        let lines = order_doc
            .lines
            .iter()
            .filter(|l| !l.fulfilled && l.quantity > 0)
            .map(|l| ShipmentLine {
                origin_line: l.line_number,
                item: l.item,
                pending_quantity: l.quantity,
                received: false,
                quantity_received: 0,
                amount: Decimal::ZERO,
                location: None,
                tracking_no: None,
                tracking_url: None,
            })
            .collect();
        Ok(Shipment {
            id: None,
            order,
            location,
            trans_date: None,
            status: ShipmentStatus::Pending,
            memo: None,
            total: Decimal::ZERO,
            reversal_created: false,
            lines,
        })
    }

    async fn create_shipment(&self, shipment: &Shipment) -> Result<ShipmentId, StoreError> {
        if self.fail_shipment_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("shipment create rejected".to_string()));
        }
        let mut inner = self.lock();
        inner.next_shipment += 1;
        let id = ShipmentId::new(inner.next_shipment);
        let mut stored = shipment.clone();
        stored.id = Some(id);
        inner.shipments.insert(id, stored);
        Ok(id)
    }

    async fn load_shipment(&self, id: ShipmentId) -> Result<Shipment, StoreError> {
        self.lock()
            .shipments
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("shipment", id))
    }

    async fn update_shipment(&self, shipment: &Shipment) -> Result<(), StoreError> {
        if self.fail_shipment_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("shipment update rejected".to_string()));
        }
        let id = shipment
            .id
            .ok_or_else(|| StoreError::Backend("shipment has no identifier".to_string()))?;
        let mut inner = self.lock();
        if !inner.shipments.contains_key(&id) {
            return Err(StoreError::not_found("shipment", id));
        }
        inner.shipments.insert(id, shipment.clone());
        Ok(())
    }
}

#[async_trait]
impl ReversalStore for MemoryStore {
    async fn create_reversal(
        &self,
        reversal: &InventoryReversal,
    ) -> Result<ReversalId, StoreError> {
        let mut inner = self.lock();
        inner.next_reversal += 1;
        let id = ReversalId::new(inner.next_reversal);
        inner.reversals.insert(id, reversal.clone());
        Ok(id)
    }
}

#[async_trait]
impl LocationDirectory for MemoryStore {
    async fn load_location(&self, id: LocationId) -> Result<LocationRecord, StoreError> {
        if self.fail_location_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("location lookup rejected".to_string()));
        }
        self.lock()
            .locations
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("location", id))
    }
}

#[async_trait]
impl SeedSource for MemoryStore {
    async fn candidate_orders(&self, search_id: &str) -> Result<Vec<OrderId>, StoreError> {
        self.lock()
            .datasets
            .get(search_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("dataset", search_id))
    }
}
