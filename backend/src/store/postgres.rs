//! PostgreSQL ledger store
//!
//! A unit of work is one database transaction. Stock rows and the document
//! being transitioned are read `FOR UPDATE`, so concurrent transitions that
//! touch the same rows queue on the row locks and each sees the other's
//! committed result. Plain document reads take no locks.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::{
    ActivityStatus, AuditItem, Category, DocumentFilter, DocumentOrder, DocumentStatus,
    InventoryAudit, Product, PurchaseItem, PurchaseOrder, SalesItem, SalesOrder, StockEntry,
    StockFilter, StockKey, Supplier, TransferItem, TransferOrder, Warehouse,
};

use super::{
    apply_delta, check_absolute_quantity, CatalogRepository, DocumentRepository, LedgerStore,
    StockStore, UnitOfWork,
};
use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
    statement_timeout_ms: u64,
}

impl PgLedgerStore {
    pub fn new(db: PgPool, statement_timeout_ms: u64) -> Self {
        Self {
            db,
            statement_timeout_ms,
        }
    }

    /// Create the pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;
        Ok(Self::new(db, config.statement_timeout_ms))
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let mut tx = self.db.begin().await?;
        // SET does not accept bind parameters; the value is an integer
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout_ms
        ))
        .execute(&mut *tx)
        .await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.db).await.is_ok()
    }
}

/// Unit of work over one PostgreSQL transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Error mapping
// ============================================================================

fn map_insert_error(err: sqlx::Error, unique_field: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::DuplicateEntry(unique_field.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return AppError::validation(
                db_err.constraint().unwrap_or("reference"),
                "References an unknown record",
            );
        }
    }
    err.into()
}

fn map_delete_error(err: sqlx::Error, what: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_foreign_key_violation() {
            return AppError::DocumentLocked(format!(
                "{} is still referenced by other records",
                what
            ));
        }
    }
    err.into()
}

fn parse_status<S: std::str::FromStr<Err = shared::UnknownStatus>>(value: &str) -> AppResult<S> {
    value
        .parse::<S>()
        .map_err(|e| AppError::Internal(format!("Corrupt status column: {}", e)))
}

fn order_clause(order: DocumentOrder) -> &'static str {
    match order {
        DocumentOrder::UpdatedDesc => "ORDER BY updated_at DESC, id",
        DocumentOrder::CreatedDesc => "ORDER BY created_at DESC, id",
        DocumentOrder::CreatedAsc => "ORDER BY created_at ASC, id",
    }
}

fn lock_clause(lock: bool) -> &'static str {
    if lock {
        " FOR UPDATE"
    } else {
        ""
    }
}

fn status_param(filter: &DocumentFilter) -> Option<String> {
    filter.status.as_ref().map(|s| s.to_ascii_uppercase())
}

/// Group line rows by their parent document id
fn group_lines<R, L>(rows: Vec<R>, parent: impl Fn(&R) -> Uuid, into: impl Fn(R) -> L) -> HashMap<Uuid, Vec<L>> {
    let mut grouped: HashMap<Uuid, Vec<L>> = HashMap::new();
    for row in rows {
        grouped.entry(parent(&row)).or_default().push(into(row));
    }
    grouped
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, FromRow)]
struct StockRow {
    product_id: Uuid,
    warehouse_id: Uuid,
    quantity: i64,
    updated_at: DateTime<Utc>,
}

impl From<StockRow> for StockEntry {
    fn from(row: StockRow) -> Self {
        StockEntry {
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            quantity: row.quantity,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    category_id: Option<Uuid>,
    cost_price: Decimal,
    selling_price: Decimal,
    safety_stock: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            category_id: row.category_id,
            cost_price: row.cost_price,
            selling_price: row.selling_price,
            safety_stock: row.safety_stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct WarehouseRow {
    id: Uuid,
    name: String,
    location: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WarehouseRow> for Warehouse {
    type Error = AppError;

    fn try_from(row: WarehouseRow) -> AppResult<Self> {
        Ok(Warehouse {
            id: row.id,
            name: row.name,
            location: row.location,
            status: parse_status::<ActivityStatus>(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SupplierRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SupplierRow> for Supplier {
    type Error = AppError;

    fn try_from(row: SupplierRow) -> AppResult<Self> {
        Ok(Supplier {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            status: parse_status::<ActivityStatus>(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = AppError;

    fn try_from(row: CategoryRow) -> AppResult<Self> {
        Ok(Category {
            id: row.id,
            name: row.name,
            status: parse_status::<ActivityStatus>(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PurchaseRow {
    id: Uuid,
    supplier_id: Uuid,
    warehouse_id: Uuid,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PurchaseItemRow {
    id: Uuid,
    purchase_order_id: Uuid,
    product_id: Uuid,
    quantity: i64,
    unit_price: Decimal,
    received_quantity: i64,
}

impl PurchaseRow {
    fn into_order(self, items: Vec<PurchaseItem>) -> AppResult<PurchaseOrder> {
        Ok(PurchaseOrder {
            id: self.id,
            supplier_id: self.supplier_id,
            warehouse_id: self.warehouse_id,
            status: parse_status(&self.status)?,
            notes: self.notes,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl From<PurchaseItemRow> for PurchaseItem {
    fn from(row: PurchaseItemRow) -> Self {
        PurchaseItem {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            received_quantity: row.received_quantity,
        }
    }
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    warehouse_id: Uuid,
    status: String,
    customer_name: Option<String>,
    notes: Option<String>,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SaleItemRow {
    id: Uuid,
    sales_order_id: Uuid,
    product_id: Uuid,
    quantity: i64,
    unit_price: Decimal,
}

impl SaleRow {
    fn into_order(self, items: Vec<SalesItem>) -> AppResult<SalesOrder> {
        Ok(SalesOrder {
            id: self.id,
            warehouse_id: self.warehouse_id,
            status: parse_status(&self.status)?,
            customer_name: self.customer_name,
            notes: self.notes,
            total_amount: self.total_amount,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl From<SaleItemRow> for SalesItem {
    fn from(row: SaleItemRow) -> Self {
        SalesItem {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

#[derive(Debug, FromRow)]
struct TransferRow {
    id: Uuid,
    source_warehouse_id: Uuid,
    dest_warehouse_id: Uuid,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TransferItemRow {
    id: Uuid,
    transfer_order_id: Uuid,
    product_id: Uuid,
    quantity: i64,
}

impl TransferRow {
    fn into_order(self, items: Vec<TransferItem>) -> AppResult<TransferOrder> {
        Ok(TransferOrder {
            id: self.id,
            source_warehouse_id: self.source_warehouse_id,
            dest_warehouse_id: self.dest_warehouse_id,
            status: parse_status(&self.status)?,
            notes: self.notes,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl From<TransferItemRow> for TransferItem {
    fn from(row: TransferItemRow) -> Self {
        TransferItem {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: Uuid,
    warehouse_id: Uuid,
    status: String,
    notes: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct AuditItemRow {
    id: Uuid,
    audit_id: Uuid,
    product_id: Uuid,
    system_quantity: i64,
    actual_quantity: Option<i64>,
    discrepancy: Option<i64>,
}

impl AuditRow {
    fn into_audit(self, items: Vec<AuditItem>) -> AppResult<InventoryAudit> {
        Ok(InventoryAudit {
            id: self.id,
            warehouse_id: self.warehouse_id,
            status: parse_status(&self.status)?,
            notes: self.notes,
            items,
            started_at: self.started_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl From<AuditItemRow> for AuditItem {
    fn from(row: AuditItemRow) -> Self {
        AuditItem {
            id: row.id,
            product_id: row.product_id,
            system_quantity: row.system_quantity,
            actual_quantity: row.actual_quantity,
            discrepancy: row.discrepancy,
        }
    }
}

const PURCHASE_COLUMNS: &str =
    "id, supplier_id, warehouse_id, status, notes, created_at, updated_at";
const PURCHASE_ITEM_COLUMNS: &str =
    "id, purchase_order_id, product_id, quantity, unit_price, received_quantity";
const SALE_COLUMNS: &str =
    "id, warehouse_id, status, customer_name, notes, total_amount, created_at, updated_at";
const SALE_ITEM_COLUMNS: &str = "id, sales_order_id, product_id, quantity, unit_price";
const TRANSFER_COLUMNS: &str =
    "id, source_warehouse_id, dest_warehouse_id, status, notes, created_at, updated_at";
const TRANSFER_ITEM_COLUMNS: &str = "id, transfer_order_id, product_id, quantity";
const AUDIT_COLUMNS: &str =
    "id, warehouse_id, status, notes, started_at, completed_at, created_at, updated_at";
const AUDIT_ITEM_COLUMNS: &str =
    "id, audit_id, product_id, system_quantity, actual_quantity, discrepancy";

// ============================================================================
// Line item writers
// ============================================================================

impl PgUnitOfWork {
    async fn load_purchase(&mut self, id: Uuid, lock: bool) -> AppResult<Option<PurchaseOrder>> {
        let header = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = $1{}",
            PURCHASE_COLUMNS,
            lock_clause(lock)
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, PurchaseItemRow>(&format!(
            "SELECT {} FROM purchase_items WHERE purchase_order_id = $1 ORDER BY position",
            PURCHASE_ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;

        header
            .into_order(items.into_iter().map(PurchaseItem::from).collect())
            .map(Some)
    }

    async fn load_sale(&mut self, id: Uuid, lock: bool) -> AppResult<Option<SalesOrder>> {
        let header = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales_orders WHERE id = $1{}",
            SALE_COLUMNS,
            lock_clause(lock)
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, SaleItemRow>(&format!(
            "SELECT {} FROM sales_items WHERE sales_order_id = $1 ORDER BY position",
            SALE_ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;

        header
            .into_order(items.into_iter().map(SalesItem::from).collect())
            .map(Some)
    }

    async fn load_transfer(&mut self, id: Uuid, lock: bool) -> AppResult<Option<TransferOrder>> {
        let header = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {} FROM transfer_orders WHERE id = $1{}",
            TRANSFER_COLUMNS,
            lock_clause(lock)
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, TransferItemRow>(&format!(
            "SELECT {} FROM transfer_items WHERE transfer_order_id = $1 ORDER BY position",
            TRANSFER_ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;

        header
            .into_order(items.into_iter().map(TransferItem::from).collect())
            .map(Some)
    }

    async fn load_audit(&mut self, id: Uuid, lock: bool) -> AppResult<Option<InventoryAudit>> {
        let header = sqlx::query_as::<_, AuditRow>(&format!(
            "SELECT {} FROM inventory_audits WHERE id = $1{}",
            AUDIT_COLUMNS,
            lock_clause(lock)
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, AuditItemRow>(&format!(
            "SELECT {} FROM audit_items WHERE audit_id = $1 ORDER BY position",
            AUDIT_ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;

        header
            .into_audit(items.into_iter().map(AuditItem::from).collect())
            .map(Some)
    }

    async fn write_purchase_items(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        sqlx::query("DELETE FROM purchase_items WHERE purchase_order_id = $1")
            .bind(order.id)
            .execute(&mut *self.tx)
            .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (id, purchase_order_id, product_id, quantity, unit_price, received_quantity, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.received_quantity)
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_insert_error(e, "purchase item"))?;
        }
        Ok(())
    }

    async fn write_sale_items(&mut self, order: &SalesOrder) -> AppResult<()> {
        sqlx::query("DELETE FROM sales_items WHERE sales_order_id = $1")
            .bind(order.id)
            .execute(&mut *self.tx)
            .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sales_items (id, sales_order_id, product_id, quantity, unit_price, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_insert_error(e, "sales item"))?;
        }
        Ok(())
    }

    async fn write_transfer_items(&mut self, order: &TransferOrder) -> AppResult<()> {
        sqlx::query("DELETE FROM transfer_items WHERE transfer_order_id = $1")
            .bind(order.id)
            .execute(&mut *self.tx)
            .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transfer_items (id, transfer_order_id, product_id, quantity, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_insert_error(e, "transfer item"))?;
        }
        Ok(())
    }

    async fn write_audit_items(&mut self, audit: &InventoryAudit) -> AppResult<()> {
        sqlx::query("DELETE FROM audit_items WHERE audit_id = $1")
            .bind(audit.id)
            .execute(&mut *self.tx)
            .await?;

        for (position, item) in audit.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO audit_items (id, audit_id, product_id, system_quantity, actual_quantity, discrepancy, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id)
            .bind(audit.id)
            .bind(item.product_id)
            .bind(item.system_quantity)
            .bind(item.actual_quantity)
            .bind(item.discrepancy)
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_insert_error(e, "audit item"))?;
        }
        Ok(())
    }
}

// ============================================================================
// Stock
// ============================================================================

#[async_trait]
impl StockStore for PgUnitOfWork {
    async fn get_stock(&mut self, key: StockKey) -> AppResult<i64> {
        let quantity = sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM inventory_items WHERE product_id = $1 AND warehouse_id = $2 FOR UPDATE",
        )
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    async fn adjust_stock(&mut self, key: StockKey, delta: i64) -> AppResult<i64> {
        // Create lazily, then lock the row for the read-modify-write
        sqlx::query(
            r#"
            INSERT INTO inventory_items (product_id, warehouse_id, quantity)
            VALUES ($1, $2, 0)
            ON CONFLICT (product_id, warehouse_id) DO NOTHING
            "#,
        )
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, "inventory item"))?;

        let current = self.get_stock(key).await?;
        let next = apply_delta(key, current, delta)?;

        sqlx::query(
            "UPDATE inventory_items SET quantity = $3, updated_at = NOW() WHERE product_id = $1 AND warehouse_id = $2",
        )
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .bind(next)
        .execute(&mut *self.tx)
        .await?;

        Ok(next)
    }

    async fn set_stock(&mut self, key: StockKey, quantity: i64) -> AppResult<()> {
        check_absolute_quantity(key, quantity)?;

        sqlx::query(
            r#"
            INSERT INTO inventory_items (product_id, warehouse_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, warehouse_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            "#,
        )
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, "inventory item"))?;

        Ok(())
    }

    async fn list_stock(&mut self, filter: &StockFilter) -> AppResult<Vec<StockEntry>> {
        let rows = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT product_id, warehouse_id, quantity, updated_at
            FROM inventory_items
            WHERE ($1::uuid IS NULL OR product_id = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
            ORDER BY product_id, warehouse_id
            "#,
        )
        .bind(filter.product_id)
        .bind(filter.warehouse_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(StockEntry::from).collect())
    }

    async fn warehouse_stock_total(&mut self, warehouse_id: Uuid) -> AppResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM inventory_items WHERE warehouse_id = $1",
        )
        .bind(warehouse_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(total)
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[async_trait]
impl CatalogRepository for PgUnitOfWork {
    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, category_id, cost_price, selling_price, safety_stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.category_id)
        .bind(product.cost_price)
        .bind(product.selling_price)
        .bind(product.safety_stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, "sku"))?;

        Ok(())
    }

    async fn get_product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, sku, name, category_id, cost_price, selling_price, safety_stock, created_at, updated_at
            FROM products WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn list_products(&mut self) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, sku, name, category_id, cost_price, selling_price, safety_stock, created_at, updated_at
            FROM products ORDER BY name ASC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn set_cost_price(&mut self, product_id: Uuid, cost_price: Decimal) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE products SET cost_price = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(product_id)
        .bind(cost_price)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }

    async fn count_products_in_category(&mut self, category_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE category_id = $1",
        )
        .bind(category_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO warehouses (id, name, location, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(warehouse.id)
        .bind(&warehouse.name)
        .bind(&warehouse.location)
        .bind(warehouse.status.as_str())
        .bind(warehouse.created_at)
        .bind(warehouse.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, "warehouse"))?;

        Ok(())
    }

    async fn get_warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>> {
        sqlx::query_as::<_, WarehouseRow>(
            "SELECT id, name, location, status, created_at, updated_at FROM warehouses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Warehouse::try_from)
        .transpose()
    }

    async fn list_warehouses(&mut self) -> AppResult<Vec<Warehouse>> {
        sqlx::query_as::<_, WarehouseRow>(
            "SELECT id, name, location, status, created_at, updated_at FROM warehouses ORDER BY name ASC",
        )
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(Warehouse::try_from)
        .collect()
    }

    async fn delete_warehouse(&mut self, id: Uuid) -> AppResult<()> {
        // Rows still holding stock keep the foreign key in place and fail the
        // delete below, even if they were filled after the caller's check
        sqlx::query("DELETE FROM inventory_items WHERE warehouse_id = $1 AND quantity = 0")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        let result = sqlx::query("DELETE FROM warehouses WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_delete_error(e, "Warehouse"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }
        Ok(())
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, email, phone, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(supplier.status.as_str())
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, "supplier"))?;

        Ok(())
    }

    async fn get_supplier(&mut self, id: Uuid) -> AppResult<Option<Supplier>> {
        sqlx::query_as::<_, SupplierRow>(
            "SELECT id, name, email, phone, status, created_at, updated_at FROM suppliers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Supplier::try_from)
        .transpose()
    }

    async fn list_suppliers(&mut self) -> AppResult<Vec<Supplier>> {
        sqlx::query_as::<_, SupplierRow>(
            "SELECT id, name, email, phone, status, created_at, updated_at FROM suppliers ORDER BY name ASC",
        )
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(Supplier::try_from)
        .collect()
    }

    async fn delete_supplier(&mut self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_delete_error(e, "Supplier"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Supplier".to_string()));
        }
        Ok(())
    }

    async fn insert_category(&mut self, category: &Category) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(category.status.as_str())
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, "category"))?;

        Ok(())
    }

    async fn get_category(&mut self, id: Uuid) -> AppResult<Option<Category>> {
        sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, status, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Category::try_from)
        .transpose()
    }

    async fn list_categories(&mut self) -> AppResult<Vec<Category>> {
        sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, status, created_at, updated_at FROM categories ORDER BY name ASC",
        )
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(Category::try_from)
        .collect()
    }

    async fn delete_category(&mut self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_delete_error(e, "Category"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Category".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Documents
// ============================================================================

#[async_trait]
impl DocumentRepository for PgUnitOfWork {
    async fn insert_purchase(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase_orders (id, supplier_id, warehouse_id, status, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id)
        .bind(order.supplier_id)
        .bind(order.warehouse_id)
        .bind(order.status.as_str())
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, "purchase order"))?;

        self.write_purchase_items(order).await
    }

    async fn get_purchase(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>> {
        self.load_purchase(id, true).await
    }

    async fn find_purchase(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>> {
        self.load_purchase(id, false).await
    }

    async fn update_purchase(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_orders
            SET supplier_id = $2, status = $3, notes = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.supplier_id)
        .bind(order.status.as_str())
        .bind(&order.notes)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Purchase order".to_string()));
        }
        self.write_purchase_items(order).await
    }

    async fn list_purchases(&mut self, filter: &DocumentFilter) -> AppResult<Vec<PurchaseOrder>> {
        let headers = sqlx::query_as::<_, PurchaseRow>(&format!(
            r#"
            SELECT {} FROM purchase_orders
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
            {}
            "#,
            PURCHASE_COLUMNS,
            order_clause(filter.order_by)
        ))
        .bind(status_param(filter))
        .bind(filter.warehouse_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let items = sqlx::query_as::<_, PurchaseItemRow>(&format!(
            "SELECT {} FROM purchase_items WHERE purchase_order_id = ANY($1) ORDER BY position",
            PURCHASE_ITEM_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;
        let mut items = group_lines(items, |r| r.purchase_order_id, PurchaseItem::from);

        headers
            .into_iter()
            .map(|h| {
                let lines = items.remove(&h.id).unwrap_or_default();
                h.into_order(lines)
            })
            .collect()
    }

    async fn delete_purchase(&mut self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM purchase_orders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_delete_error(e, "Purchase order"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Purchase order".to_string()));
        }
        Ok(())
    }

    async fn insert_sale(&mut self, order: &SalesOrder) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales_orders (id, warehouse_id, status, customer_name, notes, total_amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id)
        .bind(order.warehouse_id)
        .bind(order.status.as_str())
        .bind(&order.customer_name)
        .bind(&order.notes)
        .bind(order.total_amount)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, "sales order"))?;

        self.write_sale_items(order).await
    }

    async fn get_sale(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>> {
        self.load_sale(id, true).await
    }

    async fn find_sale(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>> {
        self.load_sale(id, false).await
    }

    async fn update_sale(&mut self, order: &SalesOrder) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales_orders
            SET status = $2, customer_name = $3, notes = $4, total_amount = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(&order.customer_name)
        .bind(&order.notes)
        .bind(order.total_amount)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Sales order".to_string()));
        }
        self.write_sale_items(order).await
    }

    async fn list_sales(&mut self, filter: &DocumentFilter) -> AppResult<Vec<SalesOrder>> {
        let headers = sqlx::query_as::<_, SaleRow>(&format!(
            r#"
            SELECT {} FROM sales_orders
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
            {}
            "#,
            SALE_COLUMNS,
            order_clause(filter.order_by)
        ))
        .bind(status_param(filter))
        .bind(filter.warehouse_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let items = sqlx::query_as::<_, SaleItemRow>(&format!(
            "SELECT {} FROM sales_items WHERE sales_order_id = ANY($1) ORDER BY position",
            SALE_ITEM_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;
        let mut items = group_lines(items, |r| r.sales_order_id, SalesItem::from);

        headers
            .into_iter()
            .map(|h| {
                let lines = items.remove(&h.id).unwrap_or_default();
                h.into_order(lines)
            })
            .collect()
    }

    async fn delete_sale(&mut self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM sales_orders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_delete_error(e, "Sales order"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Sales order".to_string()));
        }
        Ok(())
    }

    async fn insert_transfer(&mut self, order: &TransferOrder) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transfer_orders (id, source_warehouse_id, dest_warehouse_id, status, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id)
        .bind(order.source_warehouse_id)
        .bind(order.dest_warehouse_id)
        .bind(order.status.as_str())
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, "transfer order"))?;

        self.write_transfer_items(order).await
    }

    async fn get_transfer(&mut self, id: Uuid) -> AppResult<Option<TransferOrder>> {
        self.load_transfer(id, true).await
    }

    async fn find_transfer(&mut self, id: Uuid) -> AppResult<Option<TransferOrder>> {
        self.load_transfer(id, false).await
    }

    async fn update_transfer(&mut self, order: &TransferOrder) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE transfer_orders
            SET status = $2, notes = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(&order.notes)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Transfer order".to_string()));
        }
        self.write_transfer_items(order).await
    }

    async fn list_transfers(&mut self, filter: &DocumentFilter) -> AppResult<Vec<TransferOrder>> {
        let headers = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            SELECT {} FROM transfer_orders
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR source_warehouse_id = $2 OR dest_warehouse_id = $2)
            {}
            "#,
            TRANSFER_COLUMNS,
            order_clause(filter.order_by)
        ))
        .bind(status_param(filter))
        .bind(filter.warehouse_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let items = sqlx::query_as::<_, TransferItemRow>(&format!(
            "SELECT {} FROM transfer_items WHERE transfer_order_id = ANY($1) ORDER BY position",
            TRANSFER_ITEM_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;
        let mut items = group_lines(items, |r| r.transfer_order_id, TransferItem::from);

        headers
            .into_iter()
            .map(|h| {
                let lines = items.remove(&h.id).unwrap_or_default();
                h.into_order(lines)
            })
            .collect()
    }

    async fn delete_transfer(&mut self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM transfer_orders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_delete_error(e, "Transfer order"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Transfer order".to_string()));
        }
        Ok(())
    }

    async fn insert_audit(&mut self, audit: &InventoryAudit) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_audits (id, warehouse_id, status, notes, started_at, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(audit.id)
        .bind(audit.warehouse_id)
        .bind(audit.status.as_str())
        .bind(&audit.notes)
        .bind(audit.started_at)
        .bind(audit.completed_at)
        .bind(audit.created_at)
        .bind(audit.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, "inventory audit"))?;

        self.write_audit_items(audit).await
    }

    async fn get_audit(&mut self, id: Uuid) -> AppResult<Option<InventoryAudit>> {
        self.load_audit(id, true).await
    }

    async fn find_audit(&mut self, id: Uuid) -> AppResult<Option<InventoryAudit>> {
        self.load_audit(id, false).await
    }

    async fn update_audit(&mut self, audit: &InventoryAudit) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_audits
            SET status = $2, notes = $3, started_at = $4, completed_at = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(audit.id)
        .bind(audit.status.as_str())
        .bind(&audit.notes)
        .bind(audit.started_at)
        .bind(audit.completed_at)
        .bind(audit.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Inventory audit".to_string()));
        }
        self.write_audit_items(audit).await
    }

    async fn list_audits(&mut self, filter: &DocumentFilter) -> AppResult<Vec<InventoryAudit>> {
        let headers = sqlx::query_as::<_, AuditRow>(&format!(
            r#"
            SELECT {} FROM inventory_audits
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
            {}
            "#,
            AUDIT_COLUMNS,
            order_clause(filter.order_by)
        ))
        .bind(status_param(filter))
        .bind(filter.warehouse_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let items = sqlx::query_as::<_, AuditItemRow>(&format!(
            "SELECT {} FROM audit_items WHERE audit_id = ANY($1) ORDER BY position",
            AUDIT_ITEM_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;
        let mut items = group_lines(items, |r| r.audit_id, AuditItem::from);

        headers
            .into_iter()
            .map(|h| {
                let lines = items.remove(&h.id).unwrap_or_default();
                h.into_audit(lines)
            })
            .collect()
    }

    async fn delete_audit(&mut self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM inventory_audits WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_delete_error(e, "Inventory audit"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Inventory audit".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
