//! Shared fixtures for the reconciliation integration tests.
//!
//! Every test drives the real pipeline stages against a seeded
//! [`MemoryStore`]; these helpers build the documents the scenarios share.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use rust_decimal::Decimal;

use recon_core::{AccountId, ItemId, LocationId, LocationRecord, Order, OrderLine, ShipAddress};
use recon_pipeline::{JobConfig, MemoryStore};

/// Saved-search identifier every fixture dataset registers under.
pub const SEARCH_ID: &str = "mig-orders";

/// Job configuration with the reversal account set.
#[must_use]
pub fn job_config() -> JobConfig {
    JobConfig::new(SEARCH_ID, Some(AccountId::new(9001)))
}

/// A migrated order on the tax-detail channel with a usable ship address
/// and no lines.
#[must_use]
pub fn migrated_order(id: i32) -> Order {
    Order {
        id: id.into(),
        migrated: true,
        channel: "Shopify CA".to_string(),
        subsidiary: None,
        ship_address: ShipAddress {
            addressee: Some("Jess Doe".to_string()),
            addr1: Some("1 Main St".to_string()),
        },
        adjustment_addressee: None,
        adjustment_address: None,
        lines: Vec::new(),
    }
}

/// An order line with the given coordinates and no metadata blobs.
#[must_use]
pub fn line(number: u32, item: i32, quantity: i64, amount: i64, location: Option<i32>) -> OrderLine {
    OrderLine {
        line_number: number,
        item: Some(ItemId::new(item)),
        quantity,
        amount: Decimal::from(amount),
        location: location.map(LocationId::new),
        ship_info: None,
        tax_info: None,
        tax_gst: String::new(),
        tax_pst: String::new(),
        fulfilled: false,
    }
}

/// A minimal tracking blob with just the tracking number.
#[must_use]
pub fn tracking_blob(tracking_no: &str) -> String {
    format!(r#"{{"trackingNo":"{tracking_no}"}}"#)
}

/// A full tracking blob with date, reference, and URL.
#[must_use]
pub fn tracking_blob_full(tracking_no: &str, ship_date: &str, shipment_ref: &str) -> String {
    format!(
        r#"{{"trackingNo":"{tracking_no}","shipDate":"{ship_date}","shipmentId":"{shipment_ref}","narletUrl":"https://track.example/{tracking_no}"}}"#
    )
}

/// A location directory record with a full mailing address.
#[must_use]
pub fn warehouse(id: i32, name: &str) -> LocationRecord {
    LocationRecord {
        id: LocationId::new(id),
        name: Some(name.to_string()),
        address_text: Some(format!("{name} Receiving Dock")),
    }
}

/// Seed a store with the given orders and register them all as candidates
/// under [`SEARCH_ID`].
#[must_use]
pub fn seeded_store(orders: Vec<Order>) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    let candidates = orders.iter().map(|o| o.id).collect();
    for order in orders {
        store.insert_order(order);
    }
    store.register_dataset(SEARCH_ID, candidates);
    Arc::new(store)
}
