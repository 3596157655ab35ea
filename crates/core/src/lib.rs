//! Recon Core - Shared domain types.
//!
//! This crate provides the business documents moved through the
//! reconciliation pipeline:
//!
//! - [`order`] - Migrated source orders and their line items
//! - [`shipment`] - Shipment documents derived from orders
//! - [`reversal`] - Compensating inventory reversal documents
//! - [`location`] - Location directory records
//! - [`metadata`] - Wire formats for the per-line JSON blobs written by the
//!   migration import
//! - [`types`] - Newtype wrappers for type-safe IDs and statuses
//!
//! # Architecture
//!
//! The core crate contains only types and pure parsing helpers - no I/O and
//! no store access. This keeps it lightweight and allows it to be used
//! anywhere.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod location;
pub mod metadata;
pub mod order;
pub mod reversal;
pub mod shipment;
pub mod types;

pub use location::LocationRecord;
pub use metadata::{MetadataError, TaxEntry, TrackingMeta, parse_tax_entries, parse_tracking};
pub use order::{Order, OrderLine, ShipAddress};
pub use reversal::{InventoryReversal, ReversalLine};
pub use shipment::{Shipment, ShipmentLine};
pub use types::*;
