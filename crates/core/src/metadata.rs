//! Wire formats for the per-line JSON blobs written by the migration import.
//!
//! Two blobs ride on order lines as raw JSON text:
//!
//! - shipment metadata: `{"trackingNo": "...", "shipDate": "...",
//!   "narletUrl": "...", "shipmentId": "..."}`, sometimes wrapped in a
//!   one-element list by the upstream exporter
//! - tax metadata: a list of `{"TaxName": "...", "Tax": ...}` entries whose
//!   amounts arrive as JSON numbers or numeric strings
//!
//! Both shapes are normalized here, at the parse boundary, so the pipeline
//! stages only ever see one canonical form.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors raised while decoding a metadata blob.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The blob is not valid JSON or does not match the expected shape.
    #[error("malformed metadata JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The blob is a list with no entries.
    #[error("metadata list is empty")]
    EmptyList,
}

/// Per-line shipment metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingMeta {
    /// Carrier tracking number.
    #[serde(rename = "trackingNo", default)]
    pub tracking_no: Option<String>,
    /// Ship date as an ISO date string.
    #[serde(rename = "shipDate", default)]
    pub ship_date: Option<String>,
    /// Customer-facing tracking URL.
    #[serde(rename = "narletUrl", default)]
    pub tracking_url: Option<String>,
    /// External shipment reference from the source system.
    #[serde(rename = "shipmentId", default)]
    pub shipment_ref: Option<String>,
}

impl TrackingMeta {
    /// Tracking number, when present and non-empty.
    #[must_use]
    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_no
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Parsed ship date; `None` when absent or unparseable.
    ///
    /// An unparseable date degrades to "no date" rather than failing the
    /// line; callers warn when `ship_date` is set but this returns `None`.
    #[must_use]
    pub fn parsed_ship_date(&self) -> Option<NaiveDate> {
        self.ship_date.as_deref().and_then(|s| s.trim().parse().ok())
    }

    /// External shipment reference, when present and non-empty.
    #[must_use]
    pub fn shipment_reference(&self) -> Option<&str> {
        self.shipment_ref
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// The exporter emits either a bare object or a one-element list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(TrackingMeta),
    Many(Vec<TrackingMeta>),
}

/// Parse a raw shipment metadata blob, normalizing the list shape to the
/// single object.
///
/// # Errors
///
/// Returns [`MetadataError::Malformed`] for invalid JSON and
/// [`MetadataError::EmptyList`] for an empty list.
pub fn parse_tracking(raw: &str) -> Result<TrackingMeta, MetadataError> {
    match serde_json::from_str::<OneOrMany>(raw)? {
        OneOrMany::One(meta) => Ok(meta),
        OneOrMany::Many(list) => list.into_iter().next().ok_or(MetadataError::EmptyList),
    }
}

/// One tax detail entry from the channel's per-line tax blob.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxEntry {
    /// Jurisdiction tax name (e.g., "CA GST", "ON HST", "Sales Tax").
    #[serde(rename = "TaxName", default)]
    pub name: String,
    /// Tax amount; accepted as a JSON number or a numeric string.
    #[serde(rename = "Tax", default, deserialize_with = "number_like")]
    pub amount: Decimal,
}

/// Parse a raw tax metadata blob into its entry list.
///
/// # Errors
///
/// Returns [`MetadataError::Malformed`] for invalid JSON.
pub fn parse_tax_entries(raw: &str) -> Result<Vec<TaxEntry>, MetadataError> {
    Ok(serde_json::from_str(raw)?)
}

/// Decode a number-like JSON value (number or numeric string) to a decimal.
fn number_like<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(n) => n
            .to_string()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid tax amount {n}: {e}"))),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid tax amount {s:?}: {e}"))),
        other => Err(serde::de::Error::custom(format!(
            "expected a number-like tax amount, got {other}"
        ))),
    }
}
