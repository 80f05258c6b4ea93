//! Sales order models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::lifecycle::SaleStatus;
use crate::validation::checked_total;

/// Goods sold out of one warehouse
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrder {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub status: SaleStatus,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub items: Vec<SalesItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SalesItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price: Decimal,
}

/// Sum of quantity times unit price over all lines, `None` on overflow
pub fn sale_total(items: &[SalesItem]) -> Option<Decimal> {
    checked_total(items.iter().map(|item| (item.unit_price, item.quantity)))
}

/// Input for creating a sale.
///
/// `warehouse_id` and `items` are optional on the wire so that a missing
/// field is reported as a validation error rather than a decoding failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSalesOrder {
    pub warehouse_id: Option<Uuid>,
    pub items: Option<Vec<NewSalesItem>>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    /// `COMPLETED` (the default) or `DRAFT`
    pub status: Option<SaleStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewSalesItem {
    pub product_id: Uuid,
    #[validate(range(
        min = 1,
        max = 1_000_000_000,
        message = "Quantity must be between 1 and 1000000000"
    ))]
    pub quantity: i64,
    pub unit_price: Decimal,
}

impl NewSalesItem {
    pub fn into_item(self) -> SalesItem {
        SalesItem {
            id: Uuid::new_v4(),
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
        }
    }
}

/// Patch applied to a draft sale; absent fields are kept
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderPatch {
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub items: Option<Vec<NewSalesItem>>,
}
