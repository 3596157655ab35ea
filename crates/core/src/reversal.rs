//! Compensating inventory reversal documents.
//!
//! One reversal is created per shipment that passes the reversal stage's
//! idempotency check. The document is saved exactly once and never updated.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, ItemId, LocationId, SubsidiaryId};

/// A stock-adjustment document compensating one shipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReversal {
    /// Transaction date, copied from the shipment.
    #[serde(default)]
    pub trans_date: Option<NaiveDate>,
    /// Owning subsidiary, copied from the order when present.
    #[serde(default)]
    pub subsidiary: Option<SubsidiaryId>,
    /// Adjustment account from configuration; mandatory.
    pub account: AccountId,
    /// Adjustment location.
    pub location: LocationId,
    /// Resolved addressee.
    pub addressee: String,
    /// Resolved address text.
    pub address: String,
    /// Adjustment lines; the document is persisted only when non-empty.
    pub lines: Vec<ReversalLine>,
}

/// One adjustment line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalLine {
    /// Adjusted item.
    pub item: ItemId,
    /// Adjustment location.
    pub location: LocationId,
    /// Signed quantity, copied from the matched-line descriptor.
    pub quantity: i64,
}
