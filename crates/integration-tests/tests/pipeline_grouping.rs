//! Integration tests for the grouping (map) stage.
//!
//! Each test seeds the in-memory backend, runs `process_order`, and checks
//! the persisted shipments plus the emitted work and error streams.

use recon_core::{LocationId, ShipmentStatus};
use recon_integration_tests::{line, migrated_order, seeded_store, tracking_blob, tracking_blob_full};
use recon_pipeline::stages::grouping::process_order;

// =============================================================================
// Bucketing and Matching
// =============================================================================

#[tokio::test]
async fn test_lines_group_by_location_and_match_by_line_number() {
    let mut order = migrated_order(101);
    let mut l1 = line(1, 11, 2, 10, Some(10));
    l1.ship_info = Some(tracking_blob("T1"));
    let mut l2 = line(2, 12, 3, 20, Some(10));
    l2.ship_info = Some(tracking_blob("T2"));
    let mut l3 = line(3, 13, 1, 5, Some(20));
    l3.ship_info = Some(tracking_blob("T3"));
    order.lines = vec![l1, l2, l3];
    let store = seeded_store(vec![order]);

    let (outputs, errors) = process_order(store.as_ref(), 101.into()).await;

    assert!(errors.is_empty());
    assert_eq!(outputs.len(), 2);

    let shipments = store.shipments();
    assert_eq!(shipments.len(), 2);

    let at_l1 = shipments
        .iter()
        .find(|s| s.location == LocationId::new(10))
        .expect("shipment at location 10");
    assert_eq!(at_l1.received_line_count(), 2);
    assert_eq!(at_l1.status, ShipmentStatus::Complete);
    for shipment_line in at_l1.lines.iter().filter(|l| l.received) {
        let expected = i64::from(shipment_line.origin_line) + 1;
        assert_eq!(shipment_line.quantity_received, expected);
        assert_eq!(shipment_line.location, Some(LocationId::new(10)));
    }

    let at_l2 = shipments
        .iter()
        .find(|s| s.location == LocationId::new(20))
        .expect("shipment at location 20");
    assert_eq!(at_l2.received_line_count(), 1);
}

#[tokio::test]
async fn test_header_fields_come_from_the_bucket() {
    let mut order = migrated_order(101);
    let mut l1 = line(1, 11, 2, 10, Some(10));
    l1.ship_info = Some(tracking_blob_full("T1", "2024-03-15", "SHP-77"));
    let mut l2 = line(2, 12, 1, 15, Some(10));
    l2.ship_info = Some(tracking_blob("T2"));
    order.lines = vec![l1, l2];
    let store = seeded_store(vec![order]);

    let (outputs, errors) = process_order(store.as_ref(), 101.into()).await;
    assert!(errors.is_empty());
    assert_eq!(outputs.len(), 1);

    let shipment = store.shipments().remove(0);
    assert_eq!(shipment.memo.as_deref(), Some("SHP-77"));
    assert_eq!(
        shipment.trans_date,
        chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
    );
    assert_eq!(shipment.total, rust_decimal::Decimal::from(25));
    let received: Vec<_> = shipment.lines.iter().filter(|l| l.received).collect();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].tracking_no.as_deref(), Some("T1"));
    assert_eq!(
        received[0].tracking_url.as_deref(),
        Some("https://track.example/T1")
    );
}

// =============================================================================
// Eligibility Screen
// =============================================================================

#[tokio::test]
async fn test_ineligible_lines_are_skipped_not_fatal() {
    let mut order = migrated_order(101);
    let mut good = line(1, 11, 2, 10, Some(10));
    good.ship_info = Some(tracking_blob("T1"));
    let no_meta = line(2, 12, 1, 5, Some(10));
    let mut no_location = line(3, 13, 1, 5, None);
    no_location.ship_info = Some(tracking_blob("T3"));
    let mut malformed = line(4, 14, 1, 5, Some(10));
    malformed.ship_info = Some("{not json".to_string());
    order.lines = vec![good, no_meta, no_location, malformed];
    let store = seeded_store(vec![order]);

    let (outputs, errors) = process_order(store.as_ref(), 101.into()).await;

    assert_eq!(outputs.len(), 1);
    assert_eq!(errors.len(), 3);
    let shipments = store.shipments();
    assert_eq!(shipments.len(), 1);
    assert_eq!(shipments[0].received_line_count(), 1);
}

#[tokio::test]
async fn test_non_migrated_order_is_untouched() {
    let mut order = migrated_order(101);
    order.migrated = false;
    let mut l1 = line(1, 11, 2, 10, Some(10));
    l1.ship_info = Some(tracking_blob("T1"));
    order.lines = vec![l1];
    let store = seeded_store(vec![order]);

    let (outputs, errors) = process_order(store.as_ref(), 101.into()).await;

    assert!(outputs.is_empty());
    assert!(errors.is_empty());
    assert!(store.shipments().is_empty());
}

#[tokio::test]
async fn test_missing_order_is_absorbed_into_the_error_stream() {
    let store = seeded_store(Vec::new());
    let (outputs, errors) = process_order(store.as_ref(), 999.into()).await;
    assert!(outputs.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("order processing failed"));
}

// =============================================================================
// Tax Reallocation
// =============================================================================

#[tokio::test]
async fn test_tax_buckets_written_back_and_saved() {
    let mut order = migrated_order(101);
    let mut l1 = line(1, 11, 2, 10, Some(10));
    l1.ship_info = Some(tracking_blob("T1"));
    l1.tax_info =
        Some(r#"[{"TaxName":"CA GST","Tax":5},{"TaxName":"CA PST","Tax":3}]"#.to_string());
    let mut l2 = line(2, 12, 1, 5, Some(10));
    l2.ship_info = Some(tracking_blob("T2"));
    l2.tax_info = Some(r#"[{"TaxName":"Sales Tax","Tax":10}]"#.to_string());
    order.lines = vec![l1, l2];
    let store = seeded_store(vec![order]);

    let (_, errors) = process_order(store.as_ref(), 101.into()).await;
    assert!(errors.is_empty());

    let saved = store.order(101.into()).expect("order persisted");
    assert_eq!(saved.lines[0].tax_gst, "5.00");
    assert_eq!(saved.lines[0].tax_pst, "3.00");
    assert_eq!(saved.lines[1].tax_gst, "10.00");
    assert_eq!(saved.lines[1].tax_pst, "0.00");
}

#[tokio::test]
async fn test_tax_pass_only_runs_for_the_detail_channel() {
    let mut order = migrated_order(101);
    order.channel = "Wholesale".to_string();
    let mut l1 = line(1, 11, 2, 10, Some(10));
    l1.ship_info = Some(tracking_blob("T1"));
    l1.tax_info = Some(r#"[{"TaxName":"CA GST","Tax":5}]"#.to_string());
    order.lines = vec![l1];
    let store = seeded_store(vec![order]);

    let (outputs, _) = process_order(store.as_ref(), 101.into()).await;
    assert_eq!(outputs.len(), 1);

    let saved = store.order(101.into()).expect("order present");
    assert!(saved.lines[0].tax_gst.is_empty());
    assert!(saved.lines[0].tax_pst.is_empty());
}

#[tokio::test]
async fn test_tax_save_failure_does_not_block_shipments() {
    let mut order = migrated_order(101);
    let mut l1 = line(1, 11, 2, 10, Some(10));
    l1.ship_info = Some(tracking_blob("T1"));
    l1.tax_info = Some(r#"[{"TaxName":"CA GST","Tax":5}]"#.to_string());
    order.lines = vec![l1];
    let store = seeded_store(vec![order]);
    store.fail_order_saves(true);

    let (outputs, errors) = process_order(store.as_ref(), 101.into()).await;

    assert_eq!(outputs.len(), 1, "shipment creation is not on the tax path");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("order save failed after tax reallocation"));
    assert_eq!(store.shipments().len(), 1);
}

// =============================================================================
// Persistence Failure
// =============================================================================

#[tokio::test]
async fn test_create_failure_leaves_lines_eligible_for_retry() {
    let mut order = migrated_order(101);
    let mut l1 = line(1, 11, 2, 10, Some(10));
    l1.ship_info = Some(tracking_blob("T1"));
    order.lines = vec![l1];
    let store = seeded_store(vec![order]);
    store.fail_shipment_creates(true);

    let (outputs, errors) = process_order(store.as_ref(), 101.into()).await;
    assert!(outputs.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("shipment save failed"));
    assert!(store.shipments().is_empty());

    // The lines were never flagged, so the next run picks them up.
    store.fail_shipment_creates(false);
    let (outputs, errors) = process_order(store.as_ref(), 101.into()).await;
    assert_eq!(outputs.len(), 1);
    assert!(errors.is_empty());
    assert_eq!(store.shipments().len(), 1);
}
