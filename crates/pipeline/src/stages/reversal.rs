//! Reversal stage: the per-shipment "reduce" step.
//!
//! For one created shipment, this stage posts the compensating inventory
//! reversal document and flips the idempotency flags: the fulfillment-done
//! marker on each originating order line and the reversal-created marker on
//! the shipment.
//!
//! There is no multi-document transaction, so the persists run in a mandated
//! order - reversal document, then order, then shipment flag - biasing a
//! partial failure toward "reversal posted but not yet marked", which a
//! later run can reconcile, rather than the unrecoverable inverse.

use tracing::{debug, error, info, instrument, warn};

use recon_core::{InventoryReversal, LocationId, Order, ReversalId, ReversalLine, ShipmentId};

use crate::config::JobConfig;
use crate::error::{ErrorRecord, Stage, StageError};
use crate::stages::grouping::ShipmentWork;
use crate::store::{LocationDirectory, OrderStore, ReversalStore, ShipmentStore};

/// Addressee used when neither the location nor the order provides one.
pub const FALLBACK_ADDRESSEE: &str = "Inventory Adjustment";
/// Address used when neither the location nor the order provides one.
pub const FALLBACK_ADDRESS: &str = "Default Adjustment Address";

/// Run the reversal stage for one created shipment.
///
/// Returns the posted reversal's identifier (when one was posted) and the
/// error stream for the audit stage. Never fails: whole-invocation errors
/// are absorbed into the stream.
#[instrument(skip(store, config, work), fields(order = %work.order))]
pub async fn process_shipment<S>(
    store: &S,
    config: &JobConfig,
    shipment_id: ShipmentId,
    work: &ShipmentWork,
) -> (Option<ReversalId>, Vec<ErrorRecord>)
where
    S: OrderStore + ShipmentStore + ReversalStore + LocationDirectory + ?Sized,
{
    let mut errors = Vec::new();
    match run(store, config, shipment_id, work, &mut errors).await {
        Ok(outcome) => (outcome, errors),
        Err(e) => {
            error!(shipment = %shipment_id, error = %e, "reversal failed for shipment");
            errors.push(ErrorRecord::new(
                Stage::Reversal,
                shipment_id.to_string(),
                format!("shipment processing failed: {e}"),
            ));
            (None, errors)
        }
    }
}

async fn run<S>(
    store: &S,
    config: &JobConfig,
    shipment_id: ShipmentId,
    work: &ShipmentWork,
    errors: &mut Vec<ErrorRecord>,
) -> Result<Option<ReversalId>, StageError>
where
    S: OrderStore + ShipmentStore + ReversalStore + LocationDirectory + ?Sized,
{
    let mut shipment = store.load_shipment(shipment_id).await?;
    let mut order = store.load_order(work.order).await?;

    if !order.migrated {
        debug!(shipment = %shipment_id, "order is not a migration import, skipping");
        return Ok(None);
    }
    if shipment.reversal_created {
        debug!(shipment = %shipment_id, "reversal already created, skipping");
        return Ok(None);
    }

    // Mandatory configuration; absence is fatal to this invocation only.
    let account = config.require_reversal_account()?;

    if order.subsidiary.is_none() {
        warn!(order = %order.id, "order has no subsidiary, posting reversal without one");
    }

    let (addressee, address) = resolve_address(store, work.location, &order, errors).await;

    let mut reversal = InventoryReversal {
        trans_date: shipment.trans_date,
        subsidiary: order.subsidiary,
        account,
        location: work.location,
        addressee,
        address,
        lines: Vec::new(),
    };

    for descriptor in &work.matched {
        let Some(line) = order.line_mut(descriptor.line_number) else {
            debug!(
                order = %work.order,
                line = descriptor.line_number,
                "matched line no longer on order, skipping"
            );
            continue;
        };
        // Consistency guard against stale matched-line data: the line's
        // current item must still be one of the two recorded at match time.
        let current = line.item;
        let item_matches = current == Some(descriptor.item)
            || (descriptor.shipment_item.is_some() && current == descriptor.shipment_item);
        if !item_matches {
            debug!(
                order = %work.order,
                line = descriptor.line_number,
                "item changed since matching, skipping line"
            );
            continue;
        }
        reversal.lines.push(ReversalLine {
            item: descriptor.shipment_item.unwrap_or(descriptor.item),
            location: work.location,
            quantity: descriptor.quantity,
        });
        line.fulfilled = true;
    }

    if reversal.lines.is_empty() {
        info!(shipment = %shipment_id, "no adjustment lines added, nothing persisted");
        return Ok(None);
    }

    // Persist order matters: reversal document, then order flags, then the
    // shipment marker - a failure leaves a re-processable state.
    let reversal_id = match store.create_reversal(&reversal).await {
        Ok(id) => id,
        Err(e) => {
            error!(shipment = %shipment_id, error = %e, "reversal save failed");
            errors.push(ErrorRecord::new(
                Stage::Reversal,
                shipment_id.to_string(),
                format!("reversal save failed: {e}"),
            ));
            return Ok(None);
        }
    };

    backfill_adjustment_address(&mut order);
    if let Err(e) = store.save_order(&order).await {
        error!(
            order = %order.id,
            shipment = %shipment_id,
            reversal = %reversal_id,
            error = %e,
            "order save failed after reversal, manual reconciliation required"
        );
        errors.push(ErrorRecord::new(
            Stage::Reversal,
            shipment_id.to_string(),
            format!("order save failed after reversal {reversal_id}: {e}"),
        ));
        return Ok(Some(reversal_id));
    }

    shipment.reversal_created = true;
    if let Err(e) = store.update_shipment(&shipment).await {
        error!(
            shipment = %shipment_id,
            reversal = %reversal_id,
            error = %e,
            "shipment flag save failed, manual reconciliation required"
        );
        errors.push(ErrorRecord::new(
            Stage::Reversal,
            shipment_id.to_string(),
            format!("shipment flag save failed after reversal {reversal_id}: {e}"),
        ));
        return Ok(Some(reversal_id));
    }

    info!(
        shipment = %shipment_id,
        reversal = %reversal_id,
        lines = reversal.lines.len(),
        "inventory reversal posted"
    );
    Ok(Some(reversal_id))
}

/// Resolve the reversal's mailing address.
///
/// Priority: the location directory entry when it carries both a name and
/// address text; otherwise the order's shipping sub-address; otherwise the
/// adjustment literals. A directory load failure is recorded and treated
/// identically to "no valid address" - it never propagates.
async fn resolve_address<S>(
    store: &S,
    location: LocationId,
    order: &Order,
    errors: &mut Vec<ErrorRecord>,
) -> (String, String)
where
    S: LocationDirectory + ?Sized,
{
    match store.load_location(location).await {
        Ok(record) => {
            if let Some((name, text)) = record.mailing_address() {
                return (name.to_string(), text.to_string());
            }
            debug!(location = %location, "location record has no usable address, falling back to order");
        }
        Err(e) => {
            warn!(location = %location, error = %e, "location lookup failed, falling back to order");
            errors.push(ErrorRecord::new(
                Stage::Reversal,
                order.id.to_string(),
                format!("address resolution failed for location {location}: {e}"),
            ));
        }
    }

    let addressee = order
        .ship_address
        .addressee
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_ADDRESSEE.to_string());
    let address = order
        .ship_address
        .addr1
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_ADDRESS.to_string());
    (addressee, address)
}

/// Fill the order-level adjustment address fields from the shipping
/// sub-address, only where currently blank.
fn backfill_adjustment_address(order: &mut Order) {
    if order
        .adjustment_addressee
        .as_deref()
        .is_none_or(str::is_empty)
    {
        order.adjustment_addressee = order.ship_address.addressee.clone();
    }
    if order
        .adjustment_address
        .as_deref()
        .is_none_or(str::is_empty)
    {
        order.adjustment_address = order.ship_address.addr1.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_core::{LocationRecord, OrderId, ShipAddress};

    use crate::store::MemoryStore;

    fn order_with_address(addressee: Option<&str>, addr1: Option<&str>) -> Order {
        Order {
            id: OrderId::new(1),
            migrated: true,
            channel: "Shopify CA".to_string(),
            subsidiary: None,
            ship_address: ShipAddress {
                addressee: addressee.map(ToString::to_string),
                addr1: addr1.map(ToString::to_string),
            },
            adjustment_addressee: None,
            adjustment_address: None,
            lines: Vec::new(),
        }
    }

    #[test]
    fn test_backfill_only_fills_blank_fields() {
        let mut order = order_with_address(Some("Jess Doe"), Some("1 Main St"));
        order.adjustment_addressee = Some("Existing".to_string());
        backfill_adjustment_address(&mut order);
        assert_eq!(order.adjustment_addressee.as_deref(), Some("Existing"));
        assert_eq!(order.adjustment_address.as_deref(), Some("1 Main St"));
    }

    #[tokio::test]
    async fn test_resolve_address_prefers_location_record() {
        let store = MemoryStore::new();
        store.insert_location(LocationRecord {
            id: LocationId::new(7),
            name: Some("Toronto DC".to_string()),
            address_text: Some("100 Front St W".to_string()),
        });
        let order = order_with_address(Some("Jess Doe"), Some("1 Main St"));
        let mut errors = Vec::new();
        let (addressee, address) =
            resolve_address(&store, LocationId::new(7), &order, &mut errors).await;
        assert_eq!(addressee, "Toronto DC");
        assert_eq!(address, "100 Front St W");
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_address_falls_back_to_order() {
        let store = MemoryStore::new();
        store.insert_location(LocationRecord {
            id: LocationId::new(7),
            name: Some("Toronto DC".to_string()),
            address_text: None,
        });
        let order = order_with_address(Some("Jess Doe"), None);
        let mut errors = Vec::new();
        let (addressee, address) =
            resolve_address(&store, LocationId::new(7), &order, &mut errors).await;
        assert_eq!(addressee, "Jess Doe");
        assert_eq!(address, FALLBACK_ADDRESS);
        // Partial record is "no valid address", not a lookup failure.
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_address_records_lookup_failure() {
        let store = MemoryStore::new();
        store.fail_location_loads(true);
        let order = order_with_address(None, None);
        let mut errors = Vec::new();
        let (addressee, address) =
            resolve_address(&store, LocationId::new(7), &order, &mut errors).await;
        assert_eq!(addressee, FALLBACK_ADDRESSEE);
        assert_eq!(address, FALLBACK_ADDRESS);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("address resolution failed"));
    }
}
