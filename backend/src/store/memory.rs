//! In-process ledger store
//!
//! The whole state sits behind one async mutex. A unit of work holds the
//! lock for its lifetime and edits a private copy; commit replaces the
//! shared state with the copy, drop discards it. Units of work are thereby
//! fully serialized, which satisfies the per-entry ordering the ledger needs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use shared::{
    Category, DocumentFilter, DocumentStatus, InventoryAudit, Product, PurchaseOrder, SalesOrder,
    StockEntry, StockFilter, StockKey, Supplier, TransferOrder, Warehouse,
};

use super::{
    apply_delta, check_absolute_quantity, sort_documents, CatalogRepository, DocumentRepository,
    LedgerStore, StockStore, UnitOfWork,
};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    stock: HashMap<StockKey, StockEntry>,
    products: HashMap<Uuid, Product>,
    warehouses: HashMap<Uuid, Warehouse>,
    suppliers: HashMap<Uuid, Supplier>,
    categories: HashMap<Uuid, Category>,
    purchases: HashMap<Uuid, PurchaseOrder>,
    sales: HashMap<Uuid, SalesOrder>,
    transfers: HashMap<Uuid, TransferOrder>,
    audits: HashMap<Uuid, InventoryAudit>,
}

/// Transactional store kept in process memory
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// Unit of work over [`MemoryLedgerStore`]
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn insert_new<T: Clone>(table: &mut HashMap<Uuid, T>, id: Uuid, row: &T, what: &str) -> AppResult<()> {
    if table.contains_key(&id) {
        return Err(AppError::DuplicateEntry(format!("{} id", what)));
    }
    table.insert(id, row.clone());
    Ok(())
}

fn replace_existing<T: Clone>(table: &mut HashMap<Uuid, T>, id: Uuid, row: &T, what: &str) -> AppResult<()> {
    match table.get_mut(&id) {
        Some(existing) => {
            *existing = row.clone();
            Ok(())
        }
        None => Err(AppError::NotFound(what.to_string())),
    }
}

fn remove_existing<T>(table: &mut HashMap<Uuid, T>, id: Uuid, what: &str) -> AppResult<()> {
    table
        .remove(&id)
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(what.to_string()))
}

fn by_name<T>(rows: impl Iterator<Item = T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    let mut rows: Vec<T> = rows.collect();
    rows.sort_by(|a, b| name(a).cmp(name(b)));
    rows
}

#[async_trait]
impl StockStore for MemoryUnitOfWork {
    async fn get_stock(&mut self, key: StockKey) -> AppResult<i64> {
        Ok(self.working.stock.get(&key).map_or(0, |entry| entry.quantity))
    }

    async fn adjust_stock(&mut self, key: StockKey, delta: i64) -> AppResult<i64> {
        let current = self.working.stock.get(&key).map_or(0, |entry| entry.quantity);
        let next = apply_delta(key, current, delta)?;
        self.working.stock.insert(
            key,
            StockEntry {
                product_id: key.product_id,
                warehouse_id: key.warehouse_id,
                quantity: next,
                updated_at: Utc::now(),
            },
        );
        Ok(next)
    }

    async fn set_stock(&mut self, key: StockKey, quantity: i64) -> AppResult<()> {
        check_absolute_quantity(key, quantity)?;
        self.working.stock.insert(
            key,
            StockEntry {
                product_id: key.product_id,
                warehouse_id: key.warehouse_id,
                quantity,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list_stock(&mut self, filter: &StockFilter) -> AppResult<Vec<StockEntry>> {
        let mut entries: Vec<StockEntry> = self
            .working
            .stock
            .values()
            .filter(|e| filter.product_id.map_or(true, |p| e.product_id == p))
            .filter(|e| filter.warehouse_id.map_or(true, |w| e.warehouse_id == w))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.key());
        Ok(entries)
    }

    async fn warehouse_stock_total(&mut self, warehouse_id: Uuid) -> AppResult<i64> {
        Ok(self
            .working
            .stock
            .values()
            .filter(|e| e.warehouse_id == warehouse_id)
            .map(|e| e.quantity)
            .sum())
    }
}

#[async_trait]
impl CatalogRepository for MemoryUnitOfWork {
    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        if self.working.products.values().any(|p| p.sku == product.sku) {
            return Err(AppError::DuplicateEntry("sku".to_string()));
        }
        insert_new(&mut self.working.products, product.id, product, "product")
    }

    async fn get_product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn list_products(&mut self) -> AppResult<Vec<Product>> {
        Ok(by_name(self.working.products.values().cloned(), |p| p.name.as_str()))
    }

    async fn set_cost_price(&mut self, product_id: Uuid, cost_price: Decimal) -> AppResult<()> {
        let product = self
            .working
            .products
            .get_mut(&product_id)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        product.cost_price = cost_price;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn count_products_in_category(&mut self, category_id: Uuid) -> AppResult<i64> {
        Ok(self
            .working
            .products
            .values()
            .filter(|p| p.category_id == Some(category_id))
            .count() as i64)
    }

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> AppResult<()> {
        insert_new(&mut self.working.warehouses, warehouse.id, warehouse, "warehouse")
    }

    async fn get_warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>> {
        Ok(self.working.warehouses.get(&id).cloned())
    }

    async fn list_warehouses(&mut self) -> AppResult<Vec<Warehouse>> {
        Ok(by_name(self.working.warehouses.values().cloned(), |w| w.name.as_str()))
    }

    async fn delete_warehouse(&mut self, id: Uuid) -> AppResult<()> {
        let state = &self.working;
        let referenced = state.purchases.values().any(|p| p.warehouse_id == id)
            || state.sales.values().any(|s| s.warehouse_id == id)
            || state
                .transfers
                .values()
                .any(|t| t.source_warehouse_id == id || t.dest_warehouse_id == id)
            || state.audits.values().any(|a| a.warehouse_id == id);
        let holds_stock = state
            .stock
            .values()
            .any(|entry| entry.warehouse_id == id && entry.quantity > 0);
        if referenced || holds_stock {
            return Err(AppError::DocumentLocked(
                "Warehouse is still referenced by other records".to_string(),
            ));
        }
        remove_existing(&mut self.working.warehouses, id, "Warehouse")?;
        self.working.stock.retain(|key, _| key.warehouse_id != id);
        Ok(())
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> AppResult<()> {
        insert_new(&mut self.working.suppliers, supplier.id, supplier, "supplier")
    }

    async fn get_supplier(&mut self, id: Uuid) -> AppResult<Option<Supplier>> {
        Ok(self.working.suppliers.get(&id).cloned())
    }

    async fn list_suppliers(&mut self) -> AppResult<Vec<Supplier>> {
        Ok(by_name(self.working.suppliers.values().cloned(), |s| s.name.as_str()))
    }

    async fn delete_supplier(&mut self, id: Uuid) -> AppResult<()> {
        if self.working.purchases.values().any(|p| p.supplier_id == id) {
            return Err(AppError::DocumentLocked(
                "Supplier is still referenced by purchase orders".to_string(),
            ));
        }
        remove_existing(&mut self.working.suppliers, id, "Supplier")
    }

    async fn insert_category(&mut self, category: &Category) -> AppResult<()> {
        insert_new(&mut self.working.categories, category.id, category, "category")
    }

    async fn get_category(&mut self, id: Uuid) -> AppResult<Option<Category>> {
        Ok(self.working.categories.get(&id).cloned())
    }

    async fn list_categories(&mut self) -> AppResult<Vec<Category>> {
        Ok(by_name(self.working.categories.values().cloned(), |c| c.name.as_str()))
    }

    async fn delete_category(&mut self, id: Uuid) -> AppResult<()> {
        remove_existing(&mut self.working.categories, id, "Category")?;
        for product in self.working.products.values_mut() {
            if product.category_id == Some(id) {
                product.category_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for MemoryUnitOfWork {
    async fn insert_purchase(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        insert_new(&mut self.working.purchases, order.id, order, "purchase order")
    }

    async fn get_purchase(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>> {
        Ok(self.working.purchases.get(&id).cloned())
    }

    async fn find_purchase(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>> {
        self.get_purchase(id).await
    }

    async fn update_purchase(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        replace_existing(&mut self.working.purchases, order.id, order, "Purchase order")
    }

    async fn list_purchases(&mut self, filter: &DocumentFilter) -> AppResult<Vec<PurchaseOrder>> {
        let mut orders: Vec<PurchaseOrder> = self
            .working
            .purchases
            .values()
            .filter(|o| filter.matches_status(o.status.as_str()))
            .filter(|o| filter.matches_warehouse(&[o.warehouse_id]))
            .cloned()
            .collect();
        sort_documents(&mut orders, filter.order_by, |o| (o.created_at, o.updated_at));
        Ok(orders)
    }

    async fn delete_purchase(&mut self, id: Uuid) -> AppResult<()> {
        remove_existing(&mut self.working.purchases, id, "Purchase order")
    }

    async fn insert_sale(&mut self, order: &SalesOrder) -> AppResult<()> {
        insert_new(&mut self.working.sales, order.id, order, "sales order")
    }

    async fn get_sale(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>> {
        Ok(self.working.sales.get(&id).cloned())
    }

    async fn find_sale(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>> {
        self.get_sale(id).await
    }

    async fn update_sale(&mut self, order: &SalesOrder) -> AppResult<()> {
        replace_existing(&mut self.working.sales, order.id, order, "Sales order")
    }

    async fn list_sales(&mut self, filter: &DocumentFilter) -> AppResult<Vec<SalesOrder>> {
        let mut orders: Vec<SalesOrder> = self
            .working
            .sales
            .values()
            .filter(|o| filter.matches_status(o.status.as_str()))
            .filter(|o| filter.matches_warehouse(&[o.warehouse_id]))
            .cloned()
            .collect();
        sort_documents(&mut orders, filter.order_by, |o| (o.created_at, o.updated_at));
        Ok(orders)
    }

    async fn delete_sale(&mut self, id: Uuid) -> AppResult<()> {
        remove_existing(&mut self.working.sales, id, "Sales order")
    }

    async fn insert_transfer(&mut self, order: &TransferOrder) -> AppResult<()> {
        insert_new(&mut self.working.transfers, order.id, order, "transfer order")
    }

    async fn get_transfer(&mut self, id: Uuid) -> AppResult<Option<TransferOrder>> {
        Ok(self.working.transfers.get(&id).cloned())
    }

    async fn find_transfer(&mut self, id: Uuid) -> AppResult<Option<TransferOrder>> {
        self.get_transfer(id).await
    }

    async fn update_transfer(&mut self, order: &TransferOrder) -> AppResult<()> {
        replace_existing(&mut self.working.transfers, order.id, order, "Transfer order")
    }

    async fn list_transfers(&mut self, filter: &DocumentFilter) -> AppResult<Vec<TransferOrder>> {
        let mut orders: Vec<TransferOrder> = self
            .working
            .transfers
            .values()
            .filter(|o| filter.matches_status(o.status.as_str()))
            .filter(|o| filter.matches_warehouse(&[o.source_warehouse_id, o.dest_warehouse_id]))
            .cloned()
            .collect();
        sort_documents(&mut orders, filter.order_by, |o| (o.created_at, o.updated_at));
        Ok(orders)
    }

    async fn delete_transfer(&mut self, id: Uuid) -> AppResult<()> {
        remove_existing(&mut self.working.transfers, id, "Transfer order")
    }

    async fn insert_audit(&mut self, audit: &InventoryAudit) -> AppResult<()> {
        insert_new(&mut self.working.audits, audit.id, audit, "inventory audit")
    }

    async fn get_audit(&mut self, id: Uuid) -> AppResult<Option<InventoryAudit>> {
        Ok(self.working.audits.get(&id).cloned())
    }

    async fn find_audit(&mut self, id: Uuid) -> AppResult<Option<InventoryAudit>> {
        self.get_audit(id).await
    }

    async fn update_audit(&mut self, audit: &InventoryAudit) -> AppResult<()> {
        replace_existing(&mut self.working.audits, audit.id, audit, "Inventory audit")
    }

    async fn list_audits(&mut self, filter: &DocumentFilter) -> AppResult<Vec<InventoryAudit>> {
        let mut audits: Vec<InventoryAudit> = self
            .working
            .audits
            .values()
            .filter(|a| filter.matches_status(a.status.as_str()))
            .filter(|a| filter.matches_warehouse(&[a.warehouse_id]))
            .cloned()
            .collect();
        sort_documents(&mut audits, filter.order_by, |a| (a.created_at, a.updated_at));
        Ok(audits)
    }

    async fn delete_audit(&mut self, id: Uuid) -> AppResult<()> {
        remove_existing(&mut self.working.audits, id, "Inventory audit")
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
