//! Purchase order models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::lifecycle::PurchaseStatus;
use crate::validation::checked_total;

/// Goods ordered from a supplier into one warehouse
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub warehouse_id: Uuid,
    pub status: PurchaseStatus,
    pub notes: Option<String>,
    pub items: Vec<PurchaseItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub received_quantity: i64,
}

impl PurchaseOrder {
    /// Sum of quantity times unit price, `None` on overflow
    pub fn total_amount(&self) -> Option<Decimal> {
        checked_total(self.items.iter().map(|item| (item.unit_price, item.quantity)))
    }
}

/// Input for creating a purchase order
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchaseOrder {
    pub supplier_id: Uuid,
    pub warehouse_id: Uuid,
    pub notes: Option<String>,
    pub items: Vec<NewPurchaseItem>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchaseItem {
    pub product_id: Uuid,
    #[validate(range(
        min = 1,
        max = 1_000_000_000,
        message = "Quantity must be between 1 and 1000000000"
    ))]
    pub quantity: i64,
    pub unit_price: Decimal,
}

impl NewPurchaseItem {
    pub fn into_item(self) -> PurchaseItem {
        PurchaseItem {
            id: Uuid::new_v4(),
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            received_quantity: 0,
        }
    }
}

/// Patch applied to a draft purchase order; absent fields are kept
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderPatch {
    pub supplier_id: Option<Uuid>,
    pub notes: Option<String>,
    pub items: Option<Vec<NewPurchaseItem>>,
}

/// Received quantities recorded while a purchase is on order
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub lines: Vec<ReceivedLine>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedLine {
    pub item_id: Uuid,
    pub received_quantity: i64,
}
