//! JSON dataset format for the CLI harness.
//!
//! A dataset file carries everything one batch run needs:
//!
//! ```json
//! {
//!   "candidates": [101, 102],
//!   "orders": [ { "id": 101, "migrated": true, "channel": "Shopify CA",
//!                 "lines": [ ... ] } ],
//!   "locations": [ { "id": 7, "name": "Toronto DC",
//!                    "address_text": "100 Front St W" } ]
//! }
//! ```
//!
//! Monetary amounts serialize as strings (e.g., `"12.50"`). When
//! `candidates` is absent or empty, every order in the file is a candidate.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use recon_core::{LocationRecord, Order, OrderId};
use recon_pipeline::MemoryStore;

use crate::error::CliError;

/// A parsed dataset file.
#[derive(Debug, Deserialize)]
pub struct Dataset {
    /// Candidate order identifiers; defaults to every order in the file.
    #[serde(default)]
    pub candidates: Vec<OrderId>,
    /// Order documents.
    pub orders: Vec<Order>,
    /// Location directory records.
    #[serde(default)]
    pub locations: Vec<LocationRecord>,
}

impl Dataset {
    /// Load a dataset from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse a dataset from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error when the string is not valid dataset JSON.
    pub fn from_json(raw: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Candidate order identifiers, defaulting to every order in the file.
    #[must_use]
    pub fn candidate_ids(&self) -> Vec<OrderId> {
        if self.candidates.is_empty() {
            self.orders.iter().map(|o| o.id).collect()
        } else {
            self.candidates.clone()
        }
    }

    /// Seed an in-memory store with this dataset, registering the candidate
    /// row-set under the given saved-search identifier.
    #[must_use]
    pub fn into_store(self, search_id: &str) -> MemoryStore {
        let store = MemoryStore::new();
        let candidates = self.candidate_ids();
        for order in self.orders {
            store.insert_order(order);
        }
        for location in self.locations {
            store.insert_location(location);
        }
        store.register_dataset(search_id, candidates);
        store
    }
}
