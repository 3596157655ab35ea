//! Migrated source order documents.
//!
//! Orders are created upstream by the migration import. The reconciliation
//! pipeline mutates them in two independent passes: the grouping stage writes
//! the per-line tax buckets, and the reversal stage flips the per-line
//! fulfillment flags. Orders are never deleted by this subsystem.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ItemId, LocationId, OrderId, SubsidiaryId};

/// A migrated customer order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier.
    pub id: OrderId,
    /// Whether this order came in through the migration import.
    /// Orders without the flag are never touched by the pipeline.
    pub migrated: bool,
    /// Sales-channel label (e.g., "Shopify US").
    pub channel: String,
    /// Owning subsidiary, when the order carries one.
    #[serde(default)]
    pub subsidiary: Option<SubsidiaryId>,
    /// Shipping sub-address, used for address fallback and backfill.
    #[serde(default)]
    pub ship_address: ShipAddress,
    /// Order-level adjustment addressee, backfilled by the reversal stage.
    #[serde(default)]
    pub adjustment_addressee: Option<String>,
    /// Order-level adjustment address, backfilled by the reversal stage.
    #[serde(default)]
    pub adjustment_address: Option<String>,
    /// Line items in business order.
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Find a line by its stable line number.
    #[must_use]
    pub fn line(&self, line_number: u32) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.line_number == line_number)
    }

    /// Find a line by its stable line number, mutably.
    pub fn line_mut(&mut self, line_number: u32) -> Option<&mut OrderLine> {
        self.lines.iter_mut().find(|l| l.line_number == line_number)
    }
}

/// Shipping sub-address carried on an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipAddress {
    /// Addressee name.
    #[serde(default)]
    pub addressee: Option<String>,
    /// First address line.
    #[serde(default)]
    pub addr1: Option<String>,
}

/// One order line item.
///
/// The line number is the stable correlation key joining order lines to
/// shipment lines: unique within the order, insertion order = business order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    /// Stable line number (correlation key).
    pub line_number: u32,
    /// Item identifier; a line without one cannot ship.
    #[serde(default)]
    pub item: Option<ItemId>,
    /// Ordered quantity; expected > 0.
    pub quantity: i64,
    /// Monetary amount; 0 is legal and only warned about.
    pub amount: Decimal,
    /// Fulfillment location, when known.
    #[serde(default)]
    pub location: Option<LocationId>,
    /// Raw per-line shipment metadata blob (JSON) from the migration import.
    #[serde(default)]
    pub ship_info: Option<String>,
    /// Raw per-line tax metadata blob (JSON), channel-specific.
    #[serde(default)]
    pub tax_info: Option<String>,
    /// GST/HST tax bucket, written as a two-decimal string; initially empty.
    #[serde(default)]
    pub tax_gst: String,
    /// PST tax bucket, written as a two-decimal string; initially empty.
    #[serde(default)]
    pub tax_pst: String,
    /// Idempotency marker set by the reversal stage once the line is done.
    #[serde(default)]
    pub fulfilled: bool,
}
