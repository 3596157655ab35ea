//! Shipment documents derived from orders.
//!
//! One shipment represents goods dispatched from one location for one order.
//! The store derives a new shipment pre-populated with a candidate line for
//! every still-open order quantity; the grouping stage marks matched lines
//! received and sets the header fields, and the reversal stage sets the
//! `reversal_created` idempotency flag.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ItemId, LocationId, OrderId, ShipmentId, ShipmentStatus};

/// A shipment for one (order, location) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    /// Identifier; assigned by the store on creation.
    #[serde(default)]
    pub id: Option<ShipmentId>,
    /// Origin order reference.
    pub order: OrderId,
    /// Dispatch location.
    pub location: LocationId,
    /// Transaction date, from the earliest ship date seen in the bucket.
    #[serde(default)]
    pub trans_date: Option<NaiveDate>,
    /// Header status.
    #[serde(default)]
    pub status: ShipmentStatus,
    /// Header memo; carries the migration's external shipment reference.
    #[serde(default)]
    pub memo: Option<String>,
    /// Header total, summed from the matched lines' amounts.
    #[serde(default)]
    pub total: Decimal,
    /// Idempotency marker set once an inventory reversal has been posted.
    #[serde(default)]
    pub reversal_created: bool,
    /// Candidate lines, one per still-open order quantity.
    pub lines: Vec<ShipmentLine>,
}

impl Shipment {
    /// Number of lines with the received marker set.
    #[must_use]
    pub fn received_line_count(&self) -> usize {
        self.lines.iter().filter(|l| l.received).count()
    }
}

/// One shipment line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentLine {
    /// Origin order line number (the correlation key).
    pub origin_line: u32,
    /// Item resolved on the shipment line; may differ from the order line's.
    #[serde(default)]
    pub item: Option<ItemId>,
    /// Still-open quantity copied from the order line at derivation time.
    pub pending_quantity: i64,
    /// Received marker, set when the line is matched.
    #[serde(default)]
    pub received: bool,
    /// Received quantity, set when the line is matched.
    #[serde(default)]
    pub quantity_received: i64,
    /// Line amount, set when the line is matched.
    #[serde(default)]
    pub amount: Decimal,
    /// Dispatch location, set when the line is matched.
    #[serde(default)]
    pub location: Option<LocationId>,
    /// Carrier tracking number, set when the line is matched.
    #[serde(default)]
    pub tracking_no: Option<String>,
    /// Customer-facing tracking URL, when the metadata carried one.
    #[serde(default)]
    pub tracking_url: Option<String>,
}
