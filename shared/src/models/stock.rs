//! Stock entries

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the stock of one product at one warehouse
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct StockKey {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
}

impl StockKey {
    pub fn new(product_id: Uuid, warehouse_id: Uuid) -> Self {
        Self {
            product_id,
            warehouse_id,
        }
    }
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.warehouse_id)
    }
}

/// Quantity of one product held at one warehouse; never negative
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

impl StockEntry {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.warehouse_id)
    }
}

/// Sum line quantities per product, ordered by product id.
///
/// Entries are visited in this order when locking, so every document locks
/// its stock rows in the same sequence.
pub fn aggregate_by_product<I>(lines: I) -> BTreeMap<Uuid, i64>
where
    I: IntoIterator<Item = (Uuid, i64)>,
{
    let mut demand = BTreeMap::new();
    for (product_id, quantity) in lines {
        let total = demand.entry(product_id).or_insert(0i64);
        *total = total.saturating_add(quantity);
    }
    demand
}
