//! Document lifecycles
//!
//! Each document family has an explicit transition table. A transition is
//! legal only if it appears in its family's table, and the table entry names
//! the stock side effect the ledger must apply atomically with the status
//! change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a status name does not belong to a document family
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// One legal edge of a document state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule<S: 'static, E: 'static> {
    pub from: S,
    pub to: S,
    pub effect: E,
}

/// Behaviour common to every document status enum
pub trait DocumentStatus:
    Copy + Eq + std::fmt::Debug + std::fmt::Display + std::str::FromStr<Err = UnknownStatus> + 'static
{
    /// Stock side effect attached to a transition
    type Effect: Copy + Eq + std::fmt::Debug + 'static;

    /// Human readable document family name
    const DOCUMENT: &'static str;

    fn rules() -> &'static [TransitionRule<Self, Self::Effect>];

    fn as_str(&self) -> &'static str;

    /// Look up the table entry for `self -> to`
    fn rule_to(self, to: Self) -> Option<&'static TransitionRule<Self, Self::Effect>> {
        Self::rules().iter().find(|rule| rule.from == self && rule.to == to)
    }

    /// A status with no outgoing edges
    fn is_terminal(self) -> bool {
        !Self::rules().iter().any(|rule| rule.from == self)
    }
}

// ============================================================================
// Purchase orders
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseStatus {
    Draft,
    Ordered,
    Received,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseEffect {
    NoStockChange,
    /// Add each line's quantity at the order's warehouse and take its unit
    /// price as the product's cost price
    ReceiveIntoStock,
}

const PURCHASE_RULES: &[TransitionRule<PurchaseStatus, PurchaseEffect>] = &[
    TransitionRule {
        from: PurchaseStatus::Draft,
        to: PurchaseStatus::Ordered,
        effect: PurchaseEffect::NoStockChange,
    },
    TransitionRule {
        from: PurchaseStatus::Ordered,
        to: PurchaseStatus::Received,
        effect: PurchaseEffect::ReceiveIntoStock,
    },
    TransitionRule {
        from: PurchaseStatus::Draft,
        to: PurchaseStatus::Cancelled,
        effect: PurchaseEffect::NoStockChange,
    },
    TransitionRule {
        from: PurchaseStatus::Ordered,
        to: PurchaseStatus::Cancelled,
        effect: PurchaseEffect::NoStockChange,
    },
];

impl PurchaseStatus {
    /// Lines, supplier and notes may change
    pub fn is_editable(&self) -> bool {
        matches!(self, PurchaseStatus::Draft)
    }

    /// Received quantities may be recorded
    pub fn accepts_receipts(&self) -> bool {
        matches!(self, PurchaseStatus::Ordered)
    }

    pub fn is_deletable(&self) -> bool {
        matches!(self, PurchaseStatus::Draft | PurchaseStatus::Cancelled)
    }
}

impl DocumentStatus for PurchaseStatus {
    type Effect = PurchaseEffect;

    const DOCUMENT: &'static str = "purchase order";

    fn rules() -> &'static [TransitionRule<Self, Self::Effect>] {
        PURCHASE_RULES
    }

    fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Draft => "DRAFT",
            PurchaseStatus::Ordered => "ORDERED",
            PurchaseStatus::Received => "RECEIVED",
            PurchaseStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for PurchaseStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(PurchaseStatus::Draft),
            "ORDERED" => Ok(PurchaseStatus::Ordered),
            // Confirmation requests name the receipt "COMPLETED"
            "RECEIVED" | "COMPLETED" => Ok(PurchaseStatus::Received),
            "CANCELLED" => Ok(PurchaseStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

// ============================================================================
// Sales orders
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Draft,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleEffect {
    NoStockChange,
    /// Remove each line's quantity from the order's warehouse
    IssueFromStock,
}

const SALE_RULES: &[TransitionRule<SaleStatus, SaleEffect>] = &[
    TransitionRule {
        from: SaleStatus::Draft,
        to: SaleStatus::Completed,
        effect: SaleEffect::IssueFromStock,
    },
    TransitionRule {
        from: SaleStatus::Draft,
        to: SaleStatus::Cancelled,
        effect: SaleEffect::NoStockChange,
    },
];

impl SaleStatus {
    /// Effect of creating a sale directly in this status, `None` when a sale
    /// cannot be created in it
    pub fn creation_effect(&self) -> Option<SaleEffect> {
        match self {
            SaleStatus::Draft => Some(SaleEffect::NoStockChange),
            SaleStatus::Completed => Some(SaleEffect::IssueFromStock),
            SaleStatus::Cancelled => None,
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, SaleStatus::Draft)
    }

    pub fn is_deletable(&self) -> bool {
        !matches!(self, SaleStatus::Completed)
    }
}

impl DocumentStatus for SaleStatus {
    type Effect = SaleEffect;

    const DOCUMENT: &'static str = "sales order";

    fn rules() -> &'static [TransitionRule<Self, Self::Effect>] {
        SALE_RULES
    }

    fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Draft => "DRAFT",
            SaleStatus::Completed => "COMPLETED",
            SaleStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for SaleStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(SaleStatus::Draft),
            "COMPLETED" => Ok(SaleStatus::Completed),
            "CANCELLED" => Ok(SaleStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

// ============================================================================
// Transfer orders
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Draft,
    Pending,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEffect {
    NoStockChange,
    /// Remove each line's quantity from the source warehouse
    ReserveAtSource,
    /// Add each line's quantity to the destination warehouse
    DeliverToDestination,
    /// Return reserved quantities to the source warehouse
    ReleaseToSource,
}

const TRANSFER_RULES: &[TransitionRule<TransferStatus, TransferEffect>] = &[
    TransitionRule {
        from: TransferStatus::Draft,
        to: TransferStatus::Pending,
        effect: TransferEffect::ReserveAtSource,
    },
    TransitionRule {
        from: TransferStatus::Pending,
        to: TransferStatus::Completed,
        effect: TransferEffect::DeliverToDestination,
    },
    TransitionRule {
        from: TransferStatus::Draft,
        to: TransferStatus::Cancelled,
        effect: TransferEffect::NoStockChange,
    },
    TransitionRule {
        from: TransferStatus::Pending,
        to: TransferStatus::Cancelled,
        effect: TransferEffect::ReleaseToSource,
    },
];

impl TransferStatus {
    pub fn is_editable(&self) -> bool {
        matches!(self, TransferStatus::Draft)
    }

    pub fn is_deletable(&self) -> bool {
        matches!(self, TransferStatus::Draft)
    }
}

impl DocumentStatus for TransferStatus {
    type Effect = TransferEffect;

    const DOCUMENT: &'static str = "transfer order";

    fn rules() -> &'static [TransitionRule<Self, Self::Effect>] {
        TRANSFER_RULES
    }

    fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Draft => "DRAFT",
            TransferStatus::Pending => "PENDING",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for TransferStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(TransferStatus::Draft),
            "PENDING" => Ok(TransferStatus::Pending),
            "COMPLETED" => Ok(TransferStatus::Completed),
            "CANCELLED" => Ok(TransferStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

// ============================================================================
// Inventory audits
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Draft,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEffect {
    /// Record the current stock of every line as its system quantity
    SnapshotSystemQuantities,
    /// Set stock to each line's counted quantity
    ReconcileToActual,
}

const AUDIT_RULES: &[TransitionRule<AuditStatus, AuditEffect>] = &[
    TransitionRule {
        from: AuditStatus::Draft,
        to: AuditStatus::InProgress,
        effect: AuditEffect::SnapshotSystemQuantities,
    },
    TransitionRule {
        from: AuditStatus::InProgress,
        to: AuditStatus::Completed,
        effect: AuditEffect::ReconcileToActual,
    },
];

impl AuditStatus {
    /// Counted quantities may be recorded
    pub fn accepts_counts(&self) -> bool {
        matches!(self, AuditStatus::Draft | AuditStatus::InProgress)
    }

    pub fn is_deletable(&self) -> bool {
        matches!(self, AuditStatus::Draft)
    }
}

impl DocumentStatus for AuditStatus {
    type Effect = AuditEffect;

    const DOCUMENT: &'static str = "inventory audit";

    fn rules() -> &'static [TransitionRule<Self, Self::Effect>] {
        AUDIT_RULES
    }

    fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Draft => "DRAFT",
            AuditStatus::InProgress => "IN_PROGRESS",
            AuditStatus::Completed => "COMPLETED",
        }
    }
}

impl std::str::FromStr for AuditStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(AuditStatus::Draft),
            "IN_PROGRESS" => Ok(AuditStatus::InProgress),
            "COMPLETED" => Ok(AuditStatus::Completed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

macro_rules! impl_status_display {
    ($($status:ty),+) => {
        $(
            impl std::fmt::Display for $status {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(DocumentStatus::as_str(self))
                }
            }
        )+
    };
}

impl_status_display!(PurchaseStatus, SaleStatus, TransferStatus, AuditStatus);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_receipt_is_the_only_stock_edge() {
        let stock_edges: Vec<_> = PurchaseStatus::rules()
            .iter()
            .filter(|rule| rule.effect == PurchaseEffect::ReceiveIntoStock)
            .collect();
        assert_eq!(stock_edges.len(), 1);
        assert_eq!(stock_edges[0].from, PurchaseStatus::Ordered);
        assert_eq!(stock_edges[0].to, PurchaseStatus::Received);
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        assert!(PurchaseStatus::Received.is_terminal());
        assert!(PurchaseStatus::Cancelled.is_terminal());
        assert!(SaleStatus::Completed.is_terminal());
        assert!(TransferStatus::Completed.is_terminal());
        assert!(AuditStatus::Completed.is_terminal());
        assert!(!TransferStatus::Pending.is_terminal());
    }

    #[test]
    fn test_received_cannot_be_cancelled() {
        assert!(PurchaseStatus::Received
            .rule_to(PurchaseStatus::Cancelled)
            .is_none());
        assert!(PurchaseStatus::Received
            .rule_to(PurchaseStatus::Received)
            .is_none());
    }

    #[test]
    fn test_draft_purchase_cannot_skip_to_received() {
        assert!(PurchaseStatus::Draft
            .rule_to(PurchaseStatus::Received)
            .is_none());
    }

    #[test]
    fn test_transfer_edges() {
        assert_eq!(
            TransferStatus::Draft
                .rule_to(TransferStatus::Pending)
                .map(|r| r.effect),
            Some(TransferEffect::ReserveAtSource)
        );
        assert_eq!(
            TransferStatus::Pending
                .rule_to(TransferStatus::Completed)
                .map(|r| r.effect),
            Some(TransferEffect::DeliverToDestination)
        );
        assert_eq!(
            TransferStatus::Pending
                .rule_to(TransferStatus::Cancelled)
                .map(|r| r.effect),
            Some(TransferEffect::ReleaseToSource)
        );
        assert!(TransferStatus::Draft
            .rule_to(TransferStatus::Completed)
            .is_none());
    }

    #[test]
    fn test_sale_creation_effects() {
        assert_eq!(
            SaleStatus::Completed.creation_effect(),
            Some(SaleEffect::IssueFromStock)
        );
        assert_eq!(
            SaleStatus::Draft.creation_effect(),
            Some(SaleEffect::NoStockChange)
        );
        assert_eq!(SaleStatus::Cancelled.creation_effect(), None);
    }

    #[test]
    fn test_completed_alias_parses_as_received() {
        assert_eq!(
            "COMPLETED".parse::<PurchaseStatus>(),
            Ok(PurchaseStatus::Received)
        );
        assert_eq!("in_progress".parse::<AuditStatus>(), Ok(AuditStatus::InProgress));
        assert!("SHIPPED".parse::<TransferStatus>().is_err());
    }

    #[test]
    fn test_deletable_sets() {
        assert!(PurchaseStatus::Draft.is_deletable());
        assert!(PurchaseStatus::Cancelled.is_deletable());
        assert!(!PurchaseStatus::Ordered.is_deletable());
        assert!(SaleStatus::Cancelled.is_deletable());
        assert!(!SaleStatus::Completed.is_deletable());
        assert!(!TransferStatus::Pending.is_deletable());
        assert!(!AuditStatus::InProgress.is_deletable());
    }

    #[test]
    fn test_display_matches_wire_name() {
        assert_eq!(AuditStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(
            serde_json::to_string(&AuditStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
    }
}
