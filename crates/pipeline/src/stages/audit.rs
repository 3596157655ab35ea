//! Audit stage: classifies the two stages' error streams into aggregate
//! counts.
//!
//! Pure observability - no business data is touched, and the stage can
//! never fail the job: every record lands in exactly one counter, with
//! unrecognized messages falling into `other`.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ErrorRecord;

/// Aggregate error counts for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    /// Lines skipped for missing shipment metadata or location.
    pub skipped_lines: usize,
    /// Bucket lines whose correlation key matched no shipment line.
    pub unmatched_lines: usize,
    /// Buckets that produced no persistable shipment (no candidate or
    /// matched lines).
    pub empty_shipments: usize,
    /// Location lookups that fell back to the order address.
    pub address_failures: usize,
    /// Order document saves that failed.
    pub order_save_failures: usize,
    /// Everything else (item and quantity data errors, other persistence
    /// failures).
    pub other: usize,
}

impl AuditSummary {
    /// Total number of classified records.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.skipped_lines
            + self.unmatched_lines
            + self.empty_shipments
            + self.address_failures
            + self.order_save_failures
            + self.other
    }
}

/// Classify one free-text message into its counter by substring.
fn classify(summary: &mut AuditSummary, message: &str) {
    let message = message.to_lowercase();
    if message.contains("order save failed") {
        summary.order_save_failures += 1;
    } else if message.contains("address resolution failed") {
        summary.address_failures += 1;
    } else if message.contains("unmatched") {
        summary.unmatched_lines += 1;
    } else if message.contains("no candidate lines") || message.contains("no lines matched") {
        summary.empty_shipments += 1;
    } else if message.contains("metadata") || message.contains("no location") {
        summary.skipped_lines += 1;
    } else {
        summary.other += 1;
    }
}

/// Summarize both stages' error streams and emit the aggregate audit
/// record.
#[must_use]
pub fn summarize(run_id: Uuid, records: &[ErrorRecord]) -> AuditSummary {
    let mut summary = AuditSummary::default();
    for record in records {
        classify(&mut summary, &record.message);
    }
    info!(
        run = %run_id,
        skipped_lines = summary.skipped_lines,
        unmatched_lines = summary.unmatched_lines,
        empty_shipments = summary.empty_shipments,
        address_failures = summary.address_failures,
        order_save_failures = summary.order_save_failures,
        other = summary.other,
        "reconciliation audit summary"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    fn record(stage: Stage, message: &str) -> ErrorRecord {
        ErrorRecord::new(stage, "1", message)
    }

    #[test]
    fn test_classification_buckets() {
        let records = vec![
            record(Stage::Grouping, "line 2 skipped: no shipment metadata"),
            record(Stage::Grouping, "line 3 skipped: no location"),
            record(Stage::Grouping, "unmatched line 9 on order 1"),
            record(Stage::Grouping, "no lines matched for shipment at location 10"),
            record(Stage::Grouping, "no candidate lines for shipment at location 20"),
            record(Stage::Reversal, "address resolution failed for location 7: gone"),
            record(Stage::Grouping, "order save failed after tax reallocation: down"),
            record(Stage::Reversal, "order save failed after reversal 3: down"),
            record(Stage::Grouping, "line 4 skipped: non-positive quantity 0"),
        ];
        let summary = summarize(Uuid::nil(), &records);
        assert_eq!(summary.skipped_lines, 2);
        assert_eq!(summary.unmatched_lines, 1);
        assert_eq!(summary.empty_shipments, 2);
        assert_eq!(summary.address_failures, 1);
        assert_eq!(summary.order_save_failures, 2);
        assert_eq!(summary.other, 1);
        assert_eq!(summary.total(), records.len());
    }

    #[test]
    fn test_empty_stream_is_all_zero() {
        let summary = summarize(Uuid::nil(), &[]);
        assert_eq!(summary, AuditSummary::default());
        assert_eq!(summary.total(), 0);
    }
}
