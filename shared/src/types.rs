//! Common types used across the platform

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Activity flag shared by warehouses, suppliers and categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    #[default]
    Active,
    Inactive,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Active => "ACTIVE",
            ActivityStatus::Inactive => "INACTIVE",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ActivityStatus::Active)
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityStatus {
    type Err = crate::lifecycle::UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ActivityStatus::Active),
            "INACTIVE" => Ok(ActivityStatus::Inactive),
            _ => Err(crate::lifecycle::UnknownStatus(s.to_string())),
        }
    }
}

/// Caller roles recognised by the command policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Staff,
}

impl Role {
    pub const ALL: &'static [Role] = &[Role::Admin, Role::Manager, Role::Staff];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Staff => "STAFF",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort order for document listings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrder {
    /// Most recently updated first
    #[default]
    UpdatedDesc,
    CreatedDesc,
    CreatedAsc,
}

/// Filter applied to document listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFilter {
    /// Status name, compared case-insensitively
    pub status: Option<String>,
    /// For transfers this matches either the source or the destination
    pub warehouse_id: Option<Uuid>,
    #[serde(default)]
    pub order_by: DocumentOrder,
}

impl DocumentFilter {
    pub fn matches_status(&self, status: &str) -> bool {
        self.status
            .as_deref()
            .map_or(true, |wanted| wanted.eq_ignore_ascii_case(status))
    }

    pub fn matches_warehouse(&self, warehouse_ids: &[Uuid]) -> bool {
        self.warehouse_id
            .map_or(true, |wanted| warehouse_ids.contains(&wanted))
    }
}

/// Filter applied to stock listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockFilter {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
}
