//! Inventory audit models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::AuditStatus;

/// A stock count of selected products at one warehouse
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAudit {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub status: AuditStatus,
    pub notes: Option<String>,
    pub items: Vec<AuditItem>,
    /// Set when the audit moves to IN_PROGRESS
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditItem {
    pub id: Uuid,
    pub product_id: Uuid,
    /// Stock recorded when the audit started
    pub system_quantity: i64,
    /// Counted quantity, absent until recorded
    pub actual_quantity: Option<i64>,
    /// `actual_quantity - system_quantity`, fixed on completion
    pub discrepancy: Option<i64>,
}

impl AuditItem {
    pub fn compute_discrepancy(&self) -> Option<i64> {
        self.actual_quantity
            .map(|actual| actual - self.system_quantity)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInventoryAudit {
    pub warehouse_id: Uuid,
    pub notes: Option<String>,
    pub items: Vec<NewAuditItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuditItem {
    pub product_id: Uuid,
    pub actual_quantity: Option<i64>,
}

impl NewAuditItem {
    pub fn into_item(self) -> AuditItem {
        AuditItem {
            id: Uuid::new_v4(),
            product_id: self.product_id,
            system_quantity: 0,
            actual_quantity: self.actual_quantity,
            discrepancy: None,
        }
    }
}

/// Counted quantities for audit lines
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditCounts {
    pub counts: Vec<CountedLine>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountedLine {
    pub item_id: Uuid,
    pub actual_quantity: i64,
}
