//! Grouping-and-shipment stage: the per-order "map" step.
//!
//! For one candidate order, this stage runs the best-effort tax
//! reallocation, groups eligible unfulfilled lines into per-location
//! buckets, derives one shipment per bucket, matches order lines to
//! shipment lines by the stable line-correlation key, and persists each
//! shipment that matched at least one line.
//!
//! Invocations are independent across orders and may run concurrently; the
//! bucket map and consumed-key set are function-local, never shared. Any
//! failure of the whole invocation is caught at the top level and turned
//! into an error record so the batch continues with the next order.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, error, info, instrument, warn};

use recon_core::{
    ItemId, LocationId, Order, OrderId, OrderLine, Shipment, ShipmentId, ShipmentStatus,
    TaxEntry, metadata,
};

use crate::error::{ErrorRecord, Stage, StageError};
use crate::store::{OrderStore, ShipmentStore};

/// Sales-channel label whose orders carry per-line tax detail blobs.
/// Matched as a case-insensitive substring of the order's channel.
pub const TAX_DETAIL_CHANNEL: &str = "shopify";

/// Matched-line descriptor recorded for the reversal stage.
#[derive(Debug, Clone)]
pub struct MatchedLine {
    /// Origin order line number (the correlation key).
    pub line_number: u32,
    /// The order line's item at match time.
    pub item: ItemId,
    /// Item resolved on the matched shipment line, when it carried one.
    pub shipment_item: Option<ItemId>,
    /// Shipped quantity.
    pub quantity: i64,
}

/// Map-output payload, emitted once per created shipment.
#[derive(Debug, Clone)]
pub struct ShipmentWork {
    /// Origin order.
    pub order: OrderId,
    /// Dispatch location.
    pub location: LocationId,
    /// Total line count on the persisted shipment.
    pub line_count: usize,
    /// Matched-line descriptors for the reversal stage.
    pub matched: Vec<MatchedLine>,
}

/// Per-location accumulation of eligible lines, scoped to one invocation.
#[derive(Debug, Default)]
struct LocationBucket {
    lines: Vec<BucketLine>,
    /// First non-null ship date seen.
    ship_date: Option<NaiveDate>,
    /// First non-null external shipment reference seen.
    shipment_ref: Option<String>,
    /// Running sum of line amounts.
    total: Decimal,
}

#[derive(Debug)]
struct BucketLine {
    line_number: u32,
    item: ItemId,
    quantity: i64,
    amount: Decimal,
    tracking_no: String,
    tracking_url: Option<String>,
}

/// Run the grouping stage for one candidate order.
///
/// Returns the emitted `(shipment id, work)` records and the error stream
/// for the audit stage. Never fails: whole-invocation errors are absorbed
/// into the stream.
#[instrument(skip(store))]
pub async fn process_order<S>(
    store: &S,
    order_id: OrderId,
) -> (Vec<(ShipmentId, ShipmentWork)>, Vec<ErrorRecord>)
where
    S: OrderStore + ShipmentStore + ?Sized,
{
    let mut errors = Vec::new();
    match run(store, order_id, &mut errors).await {
        Ok(outputs) => (outputs, errors),
        Err(e) => {
            error!(order = %order_id, error = %e, "grouping failed for order");
            errors.push(ErrorRecord::new(
                Stage::Grouping,
                order_id.to_string(),
                format!("order processing failed: {e}"),
            ));
            (Vec::new(), errors)
        }
    }
}

async fn run<S>(
    store: &S,
    order_id: OrderId,
    errors: &mut Vec<ErrorRecord>,
) -> Result<Vec<(ShipmentId, ShipmentWork)>, StageError>
where
    S: OrderStore + ShipmentStore + ?Sized,
{
    let mut order = store.load_order(order_id).await?;
    if !order.migrated {
        debug!(order = %order_id, "order is not a migration import, skipping");
        return Ok(Vec::new());
    }

    reallocate_taxes(store, &mut order, errors).await;

    let buckets = build_buckets(&order, errors);
    if buckets.is_empty() {
        info!(order = %order_id, "no eligible lines, nothing to ship");
        return Ok(Vec::new());
    }

    let mut outputs = Vec::new();
    for (location, bucket) in &buckets {
        if let Some(output) = ship_bucket(store, &order, *location, bucket, errors).await? {
            outputs.push(output);
        }
    }
    Ok(outputs)
}

/// Best-effort tax reallocation for channel orders carrying per-line tax
/// detail. Not on the critical path for shipment creation: a save failure
/// here is recorded and the rest of the stage proceeds.
async fn reallocate_taxes<S>(store: &S, order: &mut Order, errors: &mut Vec<ErrorRecord>)
where
    S: OrderStore + ?Sized,
{
    if !order
        .channel
        .to_lowercase()
        .contains(TAX_DETAIL_CHANNEL)
    {
        return;
    }

    let mut updated = false;
    for line in &mut order.lines {
        if !line.tax_gst.is_empty() || !line.tax_pst.is_empty() {
            continue;
        }
        let Some(raw) = line.tax_info.as_deref() else {
            continue;
        };
        let entries = match metadata::parse_tax_entries(raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(order = %order.id, line = line.line_number, error = %e, "malformed tax metadata");
                continue;
            }
        };
        let (gst, pst) = split_tax_buckets(&entries);
        line.tax_gst = format!("{gst:.2}");
        line.tax_pst = format!("{pst:.2}");
        updated = true;
    }

    if updated {
        if let Err(e) = store.save_order(order).await {
            warn!(order = %order.id, error = %e, "order save failed after tax reallocation");
            errors.push(ErrorRecord::new(
                Stage::Grouping,
                order.id.to_string(),
                format!("order save failed after tax reallocation: {e}"),
            ));
        }
    }
}

/// Split tax entries into the GST/HST and PST buckets.
///
/// Classification precedence per entry name: GST/HST first, then PST;
/// VAT, generic "TAX", and unrecognized names all land in the federal
/// bucket.
fn split_tax_buckets(entries: &[TaxEntry]) -> (Decimal, Decimal) {
    let mut gst = Decimal::ZERO;
    let mut pst = Decimal::ZERO;
    for entry in entries {
        let name = entry.name.to_uppercase();
        if name.contains("GST") || name.contains("HST") {
            gst += entry.amount;
        } else if name.contains("PST") {
            pst += entry.amount;
        } else {
            gst += entry.amount;
        }
    }
    (gst, pst)
}

/// Scan the order's lines in business order and accumulate eligible ones
/// into per-location buckets. Ineligible lines are recorded and skipped;
/// they stay pending for a future run.
fn build_buckets(order: &Order, errors: &mut Vec<ErrorRecord>) -> BTreeMap<LocationId, LocationBucket> {
    let mut buckets: BTreeMap<LocationId, LocationBucket> = BTreeMap::new();

    for line in &order.lines {
        if line.fulfilled {
            debug!(order = %order.id, line = line.line_number, "line already fulfilled, skipping");
            continue;
        }
        let Some(raw) = line.ship_info.as_deref() else {
            errors.push(skip_line(order, line, "no shipment metadata"));
            continue;
        };
        let meta = match metadata::parse_tracking(raw) {
            Ok(meta) => meta,
            Err(e) => {
                errors.push(skip_line(order, line, &format!("malformed shipment metadata: {e}")));
                continue;
            }
        };
        let Some(tracking_no) = meta.tracking_number() else {
            errors.push(skip_line(order, line, "shipment metadata has no tracking number"));
            continue;
        };
        let Some(item) = line.item else {
            errors.push(skip_line(order, line, "no item"));
            continue;
        };
        if line.quantity <= 0 {
            errors.push(skip_line(
                order,
                line,
                &format!("non-positive quantity {}", line.quantity),
            ));
            continue;
        }
        let Some(location) = line.location else {
            errors.push(skip_line(order, line, "no location"));
            continue;
        };
        if line.amount.is_zero() {
            warn!(order = %order.id, line = line.line_number, "line amount is zero");
        }
        let ship_date = meta.parsed_ship_date();
        if meta.ship_date.is_some() && ship_date.is_none() {
            warn!(order = %order.id, line = line.line_number, "unparseable ship date in metadata");
        }

        let bucket = buckets.entry(location).or_default();
        if bucket.ship_date.is_none() {
            bucket.ship_date = ship_date;
        }
        if bucket.shipment_ref.is_none() {
            bucket.shipment_ref = meta.shipment_reference().map(ToString::to_string);
        }
        bucket.total += line.amount;
        bucket.lines.push(BucketLine {
            line_number: line.line_number,
            item,
            quantity: line.quantity,
            amount: line.amount,
            tracking_no: tracking_no.to_string(),
            tracking_url: meta.tracking_url.clone(),
        });
    }

    buckets
}

fn skip_line(order: &Order, line: &OrderLine, why: &str) -> ErrorRecord {
    info!(order = %order.id, line = line.line_number, why, "line skipped");
    ErrorRecord::new(
        Stage::Grouping,
        order.id.to_string(),
        format!("line {} skipped: {why}", line.line_number),
    )
}

/// Derive, match, and persist the shipment for one bucket.
///
/// Store errors during derivation propagate to the invocation's top-level
/// catch; a create failure is bucket-local (the lines stay eligible for a
/// later run - at-least-once, not exactly-once, across retries).
async fn ship_bucket<S>(
    store: &S,
    order: &Order,
    location: LocationId,
    bucket: &LocationBucket,
    errors: &mut Vec<ErrorRecord>,
) -> Result<Option<(ShipmentId, ShipmentWork)>, StageError>
where
    S: ShipmentStore + ?Sized,
{
    let mut shipment = store.derive_shipment(order.id, location).await?;
    if shipment.lines.is_empty() {
        warn!(order = %order.id, location = %location, "derived shipment has no candidate lines");
        errors.push(ErrorRecord::new(
            Stage::Grouping,
            order.id.to_string(),
            format!("no candidate lines for shipment at location {location}"),
        ));
        return Ok(None);
    }

    if bucket.ship_date.is_some() {
        shipment.trans_date = bucket.ship_date;
    }

    let matched = match_bucket(&mut shipment, order, location, bucket, errors);
    if matched.is_empty() {
        warn!(order = %order.id, location = %location, "no lines matched, shipment not persisted");
        errors.push(ErrorRecord::new(
            Stage::Grouping,
            order.id.to_string(),
            format!("no lines matched for shipment at location {location}"),
        ));
        return Ok(None);
    }

    shipment.status = ShipmentStatus::Complete;
    shipment.memo = bucket.shipment_ref.clone();
    shipment.total = bucket.total;

    match store.create_shipment(&shipment).await {
        Ok(id) => {
            info!(
                order = %order.id,
                location = %location,
                shipment = %id,
                matched = matched.len(),
                "shipment created"
            );
            Ok(Some((
                id,
                ShipmentWork {
                    order: order.id,
                    location,
                    line_count: shipment.lines.len(),
                    matched,
                },
            )))
        }
        Err(e) => {
            error!(order = %order.id, location = %location, error = %e, "shipment save failed");
            errors.push(ErrorRecord::new(
                Stage::Grouping,
                order.id.to_string(),
                format!("shipment save failed at location {location}: {e}"),
            ));
            Ok(None)
        }
    }
}

/// Match bucket lines to the derived shipment's candidate lines by
/// correlation key, first not-yet-received match wins.
///
/// A key may match at most once: a second bucket line carrying an
/// already-consumed key is surfaced as a data error rather than silently
/// re-binding to a consumed shipment line.
fn match_bucket(
    shipment: &mut Shipment,
    order: &Order,
    location: LocationId,
    bucket: &LocationBucket,
    errors: &mut Vec<ErrorRecord>,
) -> Vec<MatchedLine> {
    let mut consumed: HashSet<u32> = HashSet::new();
    let mut matched = Vec::new();

    for bucket_line in &bucket.lines {
        if !consumed.insert(bucket_line.line_number) {
            warn!(
                order = %order.id,
                line = bucket_line.line_number,
                "duplicate correlation key in bucket"
            );
            errors.push(ErrorRecord::new(
                Stage::Grouping,
                order.id.to_string(),
                format!("duplicate correlation key {}", bucket_line.line_number),
            ));
            continue;
        }
        let Some(line) = shipment
            .lines
            .iter_mut()
            .find(|l| !l.received && l.origin_line == bucket_line.line_number)
        else {
            errors.push(ErrorRecord::new(
                Stage::Grouping,
                order.id.to_string(),
                format!("unmatched line {} on order {}", bucket_line.line_number, order.id),
            ));
            continue;
        };
        line.quantity_received = bucket_line.quantity;
        line.location = Some(location);
        line.amount = bucket_line.amount;
        line.tracking_no = Some(bucket_line.tracking_no.clone());
        line.tracking_url = bucket_line.tracking_url.clone();
        line.received = true;
        matched.push(MatchedLine {
            line_number: bucket_line.line_number,
            item: bucket_line.item,
            shipment_item: line.item,
            quantity: bucket_line.quantity,
        });
    }

    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_core::ShipAddress;

    fn tax_entry(name: &str, amount: i64) -> TaxEntry {
        TaxEntry {
            name: name.to_string(),
            amount: Decimal::from(amount),
        }
    }

    fn bare_order(lines: Vec<OrderLine>) -> Order {
        Order {
            id: OrderId::new(1),
            migrated: true,
            channel: "Shopify CA".to_string(),
            subsidiary: None,
            ship_address: ShipAddress::default(),
            adjustment_addressee: None,
            adjustment_address: None,
            lines,
        }
    }

    fn eligible_line(number: u32, location: i32) -> OrderLine {
        OrderLine {
            line_number: number,
            item: Some(ItemId::new(i32::try_from(number).expect("small") + 100)),
            quantity: i64::from(number),
            amount: Decimal::from(10),
            location: Some(LocationId::new(location)),
            ship_info: Some(format!(r#"{{"trackingNo":"T{number}"}}"#)),
            tax_info: None,
            tax_gst: String::new(),
            tax_pst: String::new(),
            fulfilled: false,
        }
    }

    #[test]
    fn test_split_tax_buckets_gst_and_pst() {
        let (gst, pst) = split_tax_buckets(&[tax_entry("CA GST", 5), tax_entry("CA PST", 3)]);
        assert_eq!(format!("{gst:.2}"), "5.00");
        assert_eq!(format!("{pst:.2}"), "3.00");
    }

    #[test]
    fn test_split_tax_buckets_generic_tax_is_federal() {
        let (gst, pst) = split_tax_buckets(&[tax_entry("Sales Tax", 10)]);
        assert_eq!(format!("{gst:.2}"), "10.00");
        assert_eq!(format!("{pst:.2}"), "0.00");
    }

    #[test]
    fn test_split_tax_buckets_precedence_and_default() {
        // HST beats the generic TAX substring; unrecognized names land federal.
        let (gst, pst) = split_tax_buckets(&[
            tax_entry("ON HST Tax", 13),
            tax_entry("BC PST", 7),
            tax_entry("UK VAT", 20),
            tax_entry("Levy", 1),
        ]);
        assert_eq!(gst, Decimal::from(34));
        assert_eq!(pst, Decimal::from(7));
    }

    #[test]
    fn test_build_buckets_groups_by_location() {
        let order = bare_order(vec![
            eligible_line(1, 10),
            eligible_line(2, 10),
            eligible_line(3, 20),
        ]);
        let mut errors = Vec::new();
        let buckets = build_buckets(&order, &mut errors);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[&LocationId::new(10)].lines.len(), 2);
        assert_eq!(buckets[&LocationId::new(20)].lines.len(), 1);
        assert_eq!(buckets[&LocationId::new(10)].total, Decimal::from(20));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_build_buckets_skips_ineligible_lines() {
        let mut fulfilled = eligible_line(1, 10);
        fulfilled.fulfilled = true;
        let mut no_meta = eligible_line(2, 10);
        no_meta.ship_info = None;
        let mut no_location = eligible_line(3, 10);
        no_location.location = None;
        let mut blank_tracking = eligible_line(4, 10);
        blank_tracking.ship_info = Some(r#"{"trackingNo":""}"#.to_string());
        let mut bad_quantity = eligible_line(5, 10);
        bad_quantity.quantity = 0;

        let order = bare_order(vec![fulfilled, no_meta, no_location, blank_tracking, bad_quantity]);
        let mut errors = Vec::new();
        let buckets = build_buckets(&order, &mut errors);
        assert!(buckets.is_empty());
        // Fulfilled lines are skipped silently; the other four are recorded.
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_build_buckets_first_non_null_date_and_ref() {
        let mut dated = eligible_line(2, 10);
        dated.ship_info = Some(
            r#"{"trackingNo":"T2","shipDate":"2024-01-05","shipmentId":"SHP-2"}"#.to_string(),
        );
        let mut later = eligible_line(3, 10);
        later.ship_info = Some(
            r#"{"trackingNo":"T3","shipDate":"2024-01-01","shipmentId":"SHP-3"}"#.to_string(),
        );
        // Line 1 has neither a date nor a reference.
        let order = bare_order(vec![eligible_line(1, 10), dated, later]);
        let mut errors = Vec::new();
        let buckets = build_buckets(&order, &mut errors);
        let bucket = &buckets[&LocationId::new(10)];
        assert_eq!(bucket.ship_date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(bucket.shipment_ref.as_deref(), Some("SHP-2"));
    }

    fn derived_shipment(order: &Order, location: LocationId) -> Shipment {
        Shipment {
            id: None,
            order: order.id,
            location,
            trans_date: None,
            status: ShipmentStatus::Pending,
            memo: None,
            total: Decimal::ZERO,
            reversal_created: false,
            lines: order
                .lines
                .iter()
                .map(|l| recon_core::ShipmentLine {
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
                .collect(),
        }
    }

    #[test]
    fn test_match_bucket_sets_received_fields() {
        let order = bare_order(vec![eligible_line(1, 10), eligible_line(2, 10)]);
        let location = LocationId::new(10);
        let mut errors = Vec::new();
        let buckets = build_buckets(&order, &mut errors);
        let mut shipment = derived_shipment(&order, location);

        let matched = match_bucket(&mut shipment, &order, location, &buckets[&location], &mut errors);
        assert_eq!(matched.len(), 2);
        assert!(errors.is_empty());
        for line in &shipment.lines {
            assert!(line.received);
            assert_eq!(line.quantity_received, i64::from(line.origin_line));
            assert_eq!(line.location, Some(location));
        }
    }

    #[test]
    fn test_match_bucket_duplicate_key_is_data_error() {
        let order = bare_order(vec![eligible_line(1, 10)]);
        let location = LocationId::new(10);
        let bucket = LocationBucket {
            lines: vec![
                BucketLine {
                    line_number: 1,
                    item: ItemId::new(101),
                    quantity: 1,
                    amount: Decimal::from(10),
                    tracking_no: "T1".to_string(),
                    tracking_url: None,
                },
                BucketLine {
                    line_number: 1,
                    item: ItemId::new(101),
                    quantity: 1,
                    amount: Decimal::from(10),
                    tracking_no: "T1-dup".to_string(),
                    tracking_url: None,
                },
            ],
            ship_date: None,
            shipment_ref: None,
            total: Decimal::from(20),
        };
        let mut shipment = derived_shipment(&order, location);
        let mut errors = Vec::new();

        let matched = match_bucket(&mut shipment, &order, location, &bucket, &mut errors);
        assert_eq!(matched.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("duplicate correlation key"));
    }

    #[test]
    fn test_match_bucket_unmatched_key_is_recorded() {
        let order = bare_order(vec![eligible_line(1, 10)]);
        let location = LocationId::new(10);
        let bucket = LocationBucket {
            lines: vec![BucketLine {
                line_number: 9,
                item: ItemId::new(101),
                quantity: 1,
                amount: Decimal::from(10),
                tracking_no: "T9".to_string(),
                tracking_url: None,
            }],
            ship_date: None,
            shipment_ref: None,
            total: Decimal::from(10),
        };
        let mut shipment = derived_shipment(&order, location);
        let mut errors = Vec::new();

        let matched = match_bucket(&mut shipment, &order, location, &bucket, &mut errors);
        assert!(matched.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unmatched line 9"));
    }
}
