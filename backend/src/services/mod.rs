//! Business logic services for the retail inventory ledger

pub mod catalog;
pub mod documents;
pub mod ledger;

pub use catalog::CatalogService;
pub use documents::{
    DocumentService, InventoryAuditView, LineView, PurchaseOrderView, SalesOrderView,
    TransferOrderView,
};
pub use ledger::LedgerEngine;
