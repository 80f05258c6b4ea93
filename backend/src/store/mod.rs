//! Storage seam for the ledger
//!
//! The ledger only talks to storage through a [`UnitOfWork`]: a transaction
//! that reads and writes stock, catalog rows and documents and is either
//! committed as a whole or discarded. Dropping a unit of work without
//! calling [`UnitOfWork::commit`] rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    Category, DocumentFilter, DocumentOrder, InventoryAudit, Product, PurchaseOrder, SalesOrder,
    StockEntry, StockFilter, StockKey, Supplier, TransferOrder, Warehouse,
};

use crate::error::{AppError, AppResult};

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Per (product, warehouse) quantities
#[async_trait]
pub trait StockStore: Send {
    /// Current quantity, 0 when no entry exists. The entry stays locked for
    /// the rest of the unit of work.
    async fn get_stock(&mut self, key: StockKey) -> AppResult<i64>;

    /// Add `delta` (possibly negative) and return the new quantity. Creates
    /// the entry on first use. Fails with `InsufficientStock` rather than go
    /// below zero.
    async fn adjust_stock(&mut self, key: StockKey, delta: i64) -> AppResult<i64>;

    /// Overwrite the quantity. Fails with `InvalidQuantity` if negative.
    async fn set_stock(&mut self, key: StockKey, quantity: i64) -> AppResult<()>;

    async fn list_stock(&mut self, filter: &StockFilter) -> AppResult<Vec<StockEntry>>;

    async fn warehouse_stock_total(&mut self, warehouse_id: Uuid) -> AppResult<i64>;
}

/// Products, warehouses, suppliers and categories
#[async_trait]
pub trait CatalogRepository: Send {
    async fn insert_product(&mut self, product: &Product) -> AppResult<()>;
    async fn get_product(&mut self, id: Uuid) -> AppResult<Option<Product>>;
    async fn list_products(&mut self) -> AppResult<Vec<Product>>;
    async fn set_cost_price(&mut self, product_id: Uuid, cost_price: Decimal) -> AppResult<()>;
    async fn count_products_in_category(&mut self, category_id: Uuid) -> AppResult<i64>;

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> AppResult<()>;
    async fn get_warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>>;
    async fn list_warehouses(&mut self) -> AppResult<Vec<Warehouse>>;
    /// Remove a warehouse and its empty stock entries. Fails with
    /// `DocumentLocked` while any entry holds stock or a document refers to it.
    async fn delete_warehouse(&mut self, id: Uuid) -> AppResult<()>;

    async fn insert_supplier(&mut self, supplier: &Supplier) -> AppResult<()>;
    async fn get_supplier(&mut self, id: Uuid) -> AppResult<Option<Supplier>>;
    async fn list_suppliers(&mut self) -> AppResult<Vec<Supplier>>;
    async fn delete_supplier(&mut self, id: Uuid) -> AppResult<()>;

    async fn insert_category(&mut self, category: &Category) -> AppResult<()>;
    async fn get_category(&mut self, id: Uuid) -> AppResult<Option<Category>>;
    async fn list_categories(&mut self) -> AppResult<Vec<Category>>;
    async fn delete_category(&mut self, id: Uuid) -> AppResult<()>;
}

/// Headers and line items of the four document families.
///
/// `get_*` locks the document for the rest of the unit of work, so two
/// transitions on the same document are serialized. `find_*` reads without
/// a lock and is meant for plain reads.
#[async_trait]
pub trait DocumentRepository: Send {
    async fn insert_purchase(&mut self, order: &PurchaseOrder) -> AppResult<()>;
    async fn get_purchase(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>>;
    async fn find_purchase(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>>;
    async fn update_purchase(&mut self, order: &PurchaseOrder) -> AppResult<()>;
    async fn list_purchases(&mut self, filter: &DocumentFilter) -> AppResult<Vec<PurchaseOrder>>;
    async fn delete_purchase(&mut self, id: Uuid) -> AppResult<()>;

    async fn insert_sale(&mut self, order: &SalesOrder) -> AppResult<()>;
    async fn get_sale(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>>;
    async fn find_sale(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>>;
    async fn update_sale(&mut self, order: &SalesOrder) -> AppResult<()>;
    async fn list_sales(&mut self, filter: &DocumentFilter) -> AppResult<Vec<SalesOrder>>;
    async fn delete_sale(&mut self, id: Uuid) -> AppResult<()>;

    async fn insert_transfer(&mut self, order: &TransferOrder) -> AppResult<()>;
    async fn get_transfer(&mut self, id: Uuid) -> AppResult<Option<TransferOrder>>;
    async fn find_transfer(&mut self, id: Uuid) -> AppResult<Option<TransferOrder>>;
    async fn update_transfer(&mut self, order: &TransferOrder) -> AppResult<()>;
    async fn list_transfers(&mut self, filter: &DocumentFilter) -> AppResult<Vec<TransferOrder>>;
    async fn delete_transfer(&mut self, id: Uuid) -> AppResult<()>;

    async fn insert_audit(&mut self, audit: &InventoryAudit) -> AppResult<()>;
    async fn get_audit(&mut self, id: Uuid) -> AppResult<Option<InventoryAudit>>;
    async fn find_audit(&mut self, id: Uuid) -> AppResult<Option<InventoryAudit>>;
    async fn update_audit(&mut self, audit: &InventoryAudit) -> AppResult<()>;
    async fn list_audits(&mut self, filter: &DocumentFilter) -> AppResult<Vec<InventoryAudit>>;
    async fn delete_audit(&mut self, id: Uuid) -> AppResult<()>;
}

/// One atomic transaction over every repository
#[async_trait]
pub trait UnitOfWork: StockStore + CatalogRepository + DocumentRepository + Send {
    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Opens units of work
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Whether the backing store is reachable
    async fn ping(&self) -> bool;
}

/// Apply a delta to a current quantity, refusing to go negative
pub(crate) fn apply_delta(key: StockKey, current: i64, delta: i64) -> AppResult<i64> {
    let next = current
        .checked_add(delta)
        .ok_or_else(|| AppError::Internal(format!("Stock overflow for {}", key)))?;
    if next < 0 {
        return Err(AppError::InsufficientStock {
            product_id: key.product_id,
            available: current,
            requested: -delta,
        });
    }
    Ok(next)
}

/// Reject a negative absolute stock quantity
pub(crate) fn check_absolute_quantity(key: StockKey, quantity: i64) -> AppResult<()> {
    if quantity < 0 {
        return Err(AppError::InvalidQuantity {
            product_id: key.product_id,
            quantity,
        });
    }
    Ok(())
}

/// Order documents in memory the way the SQL listing does
pub(crate) fn sort_documents<T>(
    documents: &mut [T],
    order: DocumentOrder,
    timestamps: impl Fn(&T) -> (DateTime<Utc>, DateTime<Utc>),
) {
    match order {
        DocumentOrder::UpdatedDesc => documents.sort_by(|a, b| timestamps(b).1.cmp(&timestamps(a).1)),
        DocumentOrder::CreatedDesc => documents.sort_by(|a, b| timestamps(b).0.cmp(&timestamps(a).0)),
        DocumentOrder::CreatedAsc => documents.sort_by(|a, b| timestamps(a).0.cmp(&timestamps(b).0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> StockKey {
        StockKey::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_apply_delta_allows_reaching_zero() {
        assert_eq!(apply_delta(key(), 5, -5).unwrap(), 0);
        assert_eq!(apply_delta(key(), 5, 3).unwrap(), 8);
    }

    #[test]
    fn test_apply_delta_reports_available_and_requested() {
        let k = key();
        match apply_delta(k, 5, -8) {
            Err(AppError::InsufficientStock {
                product_id,
                available,
                requested,
            }) => {
                assert_eq!(product_id, k.product_id);
                assert_eq!(available, 5);
                assert_eq!(requested, 8);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_absolute_quantity_is_rejected() {
        assert!(check_absolute_quantity(key(), 0).is_ok());
        assert!(matches!(
            check_absolute_quantity(key(), -1),
            Err(AppError::InvalidQuantity { quantity: -1, .. })
        ));
    }
}
