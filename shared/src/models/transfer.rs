//! Warehouse transfer models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::lifecycle::TransferStatus;

/// Goods moved from one warehouse to another
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferOrder {
    pub id: Uuid,
    pub source_warehouse_id: Uuid,
    pub dest_warehouse_id: Uuid,
    pub status: TransferStatus,
    pub notes: Option<String>,
    pub items: Vec<TransferItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransferOrder {
    pub source_warehouse_id: Uuid,
    pub dest_warehouse_id: Uuid,
    pub notes: Option<String>,
    pub items: Vec<NewTransferItem>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewTransferItem {
    pub product_id: Uuid,
    #[validate(range(
        min = 1,
        max = 1_000_000_000,
        message = "Quantity must be between 1 and 1000000000"
    ))]
    pub quantity: i64,
}

impl NewTransferItem {
    pub fn into_item(self) -> TransferItem {
        TransferItem {
            id: Uuid::new_v4(),
            product_id: self.product_id,
            quantity: self.quantity,
        }
    }
}

/// Patch applied to a draft transfer; absent fields are kept
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOrderPatch {
    pub notes: Option<String>,
    pub items: Option<Vec<NewTransferItem>>,
}
