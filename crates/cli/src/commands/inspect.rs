//! `recon inspect` - validate and describe a dataset without running.

use std::path::Path;

use recon_core::parse_tracking;

use crate::dataset::Dataset;
use crate::error::CliError;

/// Parse the dataset and print order/line counts as JSON.
///
/// A line counts as shippable when its fulfillment flag is unset, its
/// shipment metadata parses with a tracking number, and it carries a
/// location - the same screen the grouping stage applies.
///
/// # Errors
///
/// Returns an error when the dataset cannot be read or parsed.
pub fn execute(path: &Path) -> Result<(), CliError> {
    let dataset = Dataset::load(path)?;

    let mut total_lines = 0_usize;
    let mut fulfilled = 0_usize;
    let mut shippable = 0_usize;
    for order in &dataset.orders {
        for line in &order.lines {
            total_lines += 1;
            if line.fulfilled {
                fulfilled += 1;
            } else if line.location.is_some()
                && line
                    .ship_info
                    .as_deref()
                    .and_then(|raw| parse_tracking(raw).ok())
                    .is_some_and(|meta| meta.tracking_number().is_some())
            {
                shippable += 1;
            }
        }
    }

    let report = serde_json::json!({
        "orders": dataset.orders.len(),
        "candidates": dataset.candidate_ids().len(),
        "locations": dataset.locations.len(),
        "lines": total_lines,
        "fulfilled_lines": fulfilled,
        "shippable_lines": shippable,
    });
    emit(&report.to_string());
    Ok(())
}

// Report JSON is the command's output contract, so it goes to stdout.
#[allow(clippy::print_stdout)]
fn emit(rendered: &str) {
    println!("{rendered}");
}
