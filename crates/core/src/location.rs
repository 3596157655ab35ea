//! Location directory records.

use serde::{Deserialize, Serialize};

use crate::types::LocationId;

/// A location record from the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Location identifier.
    pub id: LocationId,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Full address text.
    #[serde(default)]
    pub address_text: Option<String>,
}

impl LocationRecord {
    /// Mailing address as (addressee, address), when both the name and the
    /// address text are present and non-empty.
    #[must_use]
    pub fn mailing_address(&self) -> Option<(&str, &str)> {
        let name = self.name.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let text = self.address_text.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((name, text))
    }
}
