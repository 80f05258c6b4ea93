//! Document service: reads, edits and deletes of the four document families
//!
//! Status transitions belong to the ledger engine. Everything here leaves
//! stock untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use shared::{
    sale_total, validate_counted_quantity, validate_received_quantity, AuditCounts, AuditItem,
    AuditStatus, DocumentFilter, DocumentStatus, InventoryAudit, NewSalesItem, NewTransferItem,
    Product, PurchaseItem, PurchaseOrder, PurchaseOrderPatch, PurchaseReceipt, PurchaseStatus,
    SaleStatus, SalesItem, SalesOrder, SalesOrderPatch, Supplier, TransferItem, TransferOrder,
    TransferOrderPatch, TransferStatus, Warehouse,
};

use super::ledger::{
    document_total, require_active_supplier, require_products, validate_purchase_lines,
    validate_sale_lines, validate_transfer_lines,
};
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, UnitOfWork};

// ============================================================================
// Views
// ============================================================================

/// A line item with its product attached
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineView<L> {
    #[serde(flatten)]
    pub line: L,
    pub product: Option<Product>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderView {
    pub id: Uuid,
    pub status: PurchaseStatus,
    pub supplier_id: Uuid,
    pub supplier: Option<Supplier>,
    pub warehouse_id: Uuid,
    pub warehouse: Option<Warehouse>,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub items: Vec<LineView<PurchaseItem>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderView {
    pub id: Uuid,
    pub status: SaleStatus,
    pub warehouse_id: Uuid,
    pub warehouse: Option<Warehouse>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub items: Vec<LineView<SalesItem>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOrderView {
    pub id: Uuid,
    pub status: TransferStatus,
    pub source_warehouse_id: Uuid,
    pub source_warehouse: Option<Warehouse>,
    pub dest_warehouse_id: Uuid,
    pub dest_warehouse: Option<Warehouse>,
    pub notes: Option<String>,
    pub items: Vec<LineView<TransferItem>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAuditView {
    pub id: Uuid,
    pub status: AuditStatus,
    pub warehouse_id: Uuid,
    pub warehouse: Option<Warehouse>,
    pub notes: Option<String>,
    pub items: Vec<LineView<AuditItem>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog rows indexed by id, loaded once per read
struct Related {
    products: HashMap<Uuid, Product>,
    warehouses: HashMap<Uuid, Warehouse>,
    suppliers: HashMap<Uuid, Supplier>,
}

impl Related {
    async fn load(uow: &mut dyn UnitOfWork) -> AppResult<Self> {
        let products = uow.list_products().await?;
        let warehouses = uow.list_warehouses().await?;
        let suppliers = uow.list_suppliers().await?;
        Ok(Self {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
            warehouses: warehouses.into_iter().map(|w| (w.id, w)).collect(),
            suppliers: suppliers.into_iter().map(|s| (s.id, s)).collect(),
        })
    }

    fn lines<L>(&self, lines: Vec<L>, product_id: impl Fn(&L) -> Uuid) -> Vec<LineView<L>> {
        lines
            .into_iter()
            .map(|line| LineView {
                product: self.products.get(&product_id(&line)).cloned(),
                line,
            })
            .collect()
    }

    fn warehouse(&self, id: Uuid) -> Option<Warehouse> {
        self.warehouses.get(&id).cloned()
    }

    fn purchase(&self, order: PurchaseOrder) -> AppResult<PurchaseOrderView> {
        let total_amount = order.total_amount().ok_or_else(|| {
            AppError::Internal(format!("Total of purchase order {} overflows", order.id))
        })?;
        Ok(PurchaseOrderView {
            id: order.id,
            status: order.status,
            supplier_id: order.supplier_id,
            supplier: self.suppliers.get(&order.supplier_id).cloned(),
            warehouse_id: order.warehouse_id,
            warehouse: self.warehouse(order.warehouse_id),
            notes: order.notes.clone(),
            total_amount,
            items: self.lines(order.items, |i| i.product_id),
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }

    fn sale(&self, order: SalesOrder) -> SalesOrderView {
        SalesOrderView {
            id: order.id,
            status: order.status,
            warehouse_id: order.warehouse_id,
            warehouse: self.warehouse(order.warehouse_id),
            customer_name: order.customer_name,
            notes: order.notes,
            total_amount: order.total_amount,
            items: self.lines(order.items, |i| i.product_id),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }

    fn transfer(&self, order: TransferOrder) -> TransferOrderView {
        TransferOrderView {
            id: order.id,
            status: order.status,
            source_warehouse_id: order.source_warehouse_id,
            source_warehouse: self.warehouse(order.source_warehouse_id),
            dest_warehouse_id: order.dest_warehouse_id,
            dest_warehouse: self.warehouse(order.dest_warehouse_id),
            notes: order.notes,
            items: self.lines(order.items, |i| i.product_id),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }

    fn audit(&self, audit: InventoryAudit) -> InventoryAuditView {
        InventoryAuditView {
            id: audit.id,
            status: audit.status,
            warehouse_id: audit.warehouse_id,
            warehouse: self.warehouse(audit.warehouse_id),
            notes: audit.notes,
            items: self.lines(audit.items, |i| i.product_id),
            started_at: audit.started_at,
            completed_at: audit.completed_at,
            created_at: audit.created_at,
            updated_at: audit.updated_at,
        }
    }
}

/// Canonicalize the status filter for one document family
fn normalize_filter<S: DocumentStatus>(filter: &DocumentFilter) -> AppResult<DocumentFilter> {
    let status = match filter.status.as_deref() {
        Some(raw) => {
            let status = raw
                .parse::<S>()
                .map_err(|e| AppError::validation("status", e.to_string()))?;
            Some(status.as_str().to_string())
        }
        None => None,
    };
    Ok(DocumentFilter {
        status,
        warehouse_id: filter.warehouse_id,
        order_by: filter.order_by,
    })
}

fn locked<S: DocumentStatus>(id: Uuid, status: S, action: &str) -> AppError {
    AppError::DocumentLocked(format!(
        "Cannot {} {} {} while it is {}",
        action,
        S::DOCUMENT,
        id,
        status
    ))
}

// ============================================================================
// Service
// ============================================================================

/// Document service
#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn LedgerStore>,
}

impl DocumentService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Purchase orders
    // ========================================================================

    pub async fn get_purchase(&self, id: Uuid) -> AppResult<PurchaseOrderView> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .find_purchase(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;
        let related = Related::load(uow.as_mut()).await?;
        related.purchase(order)
    }

    /// List purchase orders, most recently updated first unless told otherwise
    pub async fn list_purchases(&self, filter: &DocumentFilter) -> AppResult<Vec<PurchaseOrderView>> {
        let filter = normalize_filter::<PurchaseStatus>(filter)?;
        let mut uow = self.store.begin().await?;
        let orders = uow.list_purchases(&filter).await?;
        let related = Related::load(uow.as_mut()).await?;
        orders.into_iter().map(|o| related.purchase(o)).collect()
    }

    /// Edit a DRAFT purchase order
    pub async fn update_purchase(
        &self,
        id: Uuid,
        patch: PurchaseOrderPatch,
    ) -> AppResult<PurchaseOrderView> {
        if let Some(items) = &patch.items {
            validate_purchase_lines(items)?;
        }

        let mut uow = self.store.begin().await?;
        let mut order = uow
            .get_purchase(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;
        if !order.status.is_editable() {
            return Err(locked(id, order.status, "edit"));
        }

        if let Some(supplier_id) = patch.supplier_id {
            require_active_supplier(uow.as_mut(), supplier_id).await?;
            order.supplier_id = supplier_id;
        }
        if let Some(notes) = patch.notes {
            order.notes = Some(notes);
        }
        if let Some(items) = patch.items {
            require_products(uow.as_mut(), items.iter().map(|i| i.product_id)).await?;
            order.items = items.into_iter().map(|i| i.into_item()).collect();
        }
        order.updated_at = Utc::now();

        uow.update_purchase(&order).await?;
        let related = Related::load(uow.as_mut()).await?;
        uow.commit().await?;

        tracing::info!(purchase_id = %id, "Purchase order updated");
        related.purchase(order)
    }

    /// Record per-line received quantities on an ORDERED purchase order
    pub async fn record_purchase_receipt(
        &self,
        id: Uuid,
        receipt: PurchaseReceipt,
    ) -> AppResult<PurchaseOrderView> {
        let mut uow = self.store.begin().await?;
        let mut order = uow
            .get_purchase(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;
        if !order.status.accepts_receipts() {
            return Err(locked(id, order.status, "record a receipt on"));
        }

        for line in receipt.lines {
            let item = order
                .items
                .iter_mut()
                .find(|item| item.id == line.item_id)
                .ok_or_else(|| {
                    AppError::validation("itemId", format!("Unknown purchase item {}", line.item_id))
                })?;
            validate_received_quantity(line.received_quantity, item.quantity)
                .map_err(|m| AppError::validation("receivedQuantity", m))?;
            item.received_quantity = line.received_quantity;
        }
        order.updated_at = Utc::now();

        uow.update_purchase(&order).await?;
        let related = Related::load(uow.as_mut()).await?;
        uow.commit().await?;

        tracing::info!(purchase_id = %id, "Purchase receipt recorded");
        related.purchase(order)
    }

    pub async fn delete_purchase(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .get_purchase(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;
        if !order.status.is_deletable() {
            return Err(locked(id, order.status, "delete"));
        }

        uow.delete_purchase(id).await?;
        uow.commit().await?;

        tracing::info!(purchase_id = %id, "Purchase order deleted");
        Ok(())
    }

    // ========================================================================
    // Sales orders
    // ========================================================================

    pub async fn get_sale(&self, id: Uuid) -> AppResult<SalesOrderView> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .find_sale(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;
        let related = Related::load(uow.as_mut()).await?;
        Ok(related.sale(order))
    }

    pub async fn list_sales(&self, filter: &DocumentFilter) -> AppResult<Vec<SalesOrderView>> {
        let filter = normalize_filter::<SaleStatus>(filter)?;
        let mut uow = self.store.begin().await?;
        let orders = uow.list_sales(&filter).await?;
        let related = Related::load(uow.as_mut()).await?;
        Ok(orders.into_iter().map(|o| related.sale(o)).collect())
    }

    /// Edit a DRAFT sale; the total follows the new lines
    pub async fn update_sale(&self, id: Uuid, patch: SalesOrderPatch) -> AppResult<SalesOrderView> {
        if let Some(items) = &patch.items {
            validate_sale_lines(items)?;
        }

        let mut uow = self.store.begin().await?;
        let mut order = uow
            .get_sale(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;
        if !order.status.is_editable() {
            return Err(locked(id, order.status, "edit"));
        }

        if let Some(customer_name) = patch.customer_name {
            order.customer_name = Some(customer_name);
        }
        if let Some(notes) = patch.notes {
            order.notes = Some(notes);
        }
        if let Some(items) = patch.items {
            require_products(uow.as_mut(), items.iter().map(|i| i.product_id)).await?;
            order.items = items.into_iter().map(NewSalesItem::into_item).collect();
            order.total_amount = document_total(sale_total(&order.items))?;
        }
        order.updated_at = Utc::now();

        uow.update_sale(&order).await?;
        let related = Related::load(uow.as_mut()).await?;
        uow.commit().await?;

        tracing::info!(sale_id = %id, "Sales order updated");
        Ok(related.sale(order))
    }

    pub async fn delete_sale(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .get_sale(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;
        if !order.status.is_deletable() {
            return Err(locked(id, order.status, "delete"));
        }

        uow.delete_sale(id).await?;
        uow.commit().await?;

        tracing::info!(sale_id = %id, "Sales order deleted");
        Ok(())
    }

    // ========================================================================
    // Transfer orders
    // ========================================================================

    pub async fn get_transfer(&self, id: Uuid) -> AppResult<TransferOrderView> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .find_transfer(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer order".to_string()))?;
        let related = Related::load(uow.as_mut()).await?;
        Ok(related.transfer(order))
    }

    /// List transfers; a warehouse filter matches either end of the transfer
    pub async fn list_transfers(&self, filter: &DocumentFilter) -> AppResult<Vec<TransferOrderView>> {
        let filter = normalize_filter::<TransferStatus>(filter)?;
        let mut uow = self.store.begin().await?;
        let orders = uow.list_transfers(&filter).await?;
        let related = Related::load(uow.as_mut()).await?;
        Ok(orders.into_iter().map(|o| related.transfer(o)).collect())
    }

    pub async fn update_transfer(
        &self,
        id: Uuid,
        patch: TransferOrderPatch,
    ) -> AppResult<TransferOrderView> {
        if let Some(items) = &patch.items {
            validate_transfer_lines(items)?;
        }

        let mut uow = self.store.begin().await?;
        let mut order = uow
            .get_transfer(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer order".to_string()))?;
        if !order.status.is_editable() {
            return Err(locked(id, order.status, "edit"));
        }

        if let Some(notes) = patch.notes {
            order.notes = Some(notes);
        }
        if let Some(items) = patch.items {
            require_products(uow.as_mut(), items.iter().map(|i| i.product_id)).await?;
            order.items = items.into_iter().map(NewTransferItem::into_item).collect();
        }
        order.updated_at = Utc::now();

        uow.update_transfer(&order).await?;
        let related = Related::load(uow.as_mut()).await?;
        uow.commit().await?;

        tracing::info!(transfer_id = %id, "Transfer order updated");
        Ok(related.transfer(order))
    }

    pub async fn delete_transfer(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .get_transfer(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer order".to_string()))?;
        if !order.status.is_deletable() {
            return Err(locked(id, order.status, "delete"));
        }

        uow.delete_transfer(id).await?;
        uow.commit().await?;

        tracing::info!(transfer_id = %id, "Transfer order deleted");
        Ok(())
    }

    // ========================================================================
    // Inventory audits
    // ========================================================================

    pub async fn get_audit(&self, id: Uuid) -> AppResult<InventoryAuditView> {
        let mut uow = self.store.begin().await?;
        let audit = uow
            .find_audit(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory audit".to_string()))?;
        let related = Related::load(uow.as_mut()).await?;
        Ok(related.audit(audit))
    }

    pub async fn list_audits(&self, filter: &DocumentFilter) -> AppResult<Vec<InventoryAuditView>> {
        let filter = normalize_filter::<AuditStatus>(filter)?;
        let mut uow = self.store.begin().await?;
        let audits = uow.list_audits(&filter).await?;
        let related = Related::load(uow.as_mut()).await?;
        Ok(audits.into_iter().map(|a| related.audit(a)).collect())
    }

    /// Record counted quantities while the audit is still open
    pub async fn record_audit_counts(
        &self,
        id: Uuid,
        counts: AuditCounts,
    ) -> AppResult<InventoryAuditView> {
        for line in &counts.counts {
            validate_counted_quantity(line.actual_quantity)
                .map_err(|m| AppError::validation("actualQuantity", m))?;
        }

        let mut uow = self.store.begin().await?;
        let mut audit = uow
            .get_audit(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory audit".to_string()))?;
        if !audit.status.accepts_counts() {
            return Err(locked(id, audit.status, "record counts on"));
        }

        for line in counts.counts {
            let item = audit
                .items
                .iter_mut()
                .find(|item| item.id == line.item_id)
                .ok_or_else(|| {
                    AppError::validation("itemId", format!("Unknown audit item {}", line.item_id))
                })?;
            item.actual_quantity = Some(line.actual_quantity);
        }
        audit.updated_at = Utc::now();

        uow.update_audit(&audit).await?;
        let related = Related::load(uow.as_mut()).await?;
        uow.commit().await?;

        tracing::info!(audit_id = %id, "Audit counts recorded");
        Ok(related.audit(audit))
    }

    pub async fn delete_audit(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let audit = uow
            .get_audit(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory audit".to_string()))?;
        if !audit.status.is_deletable() {
            return Err(locked(id, audit.status, "delete"));
        }

        uow.delete_audit(id).await?;
        uow.commit().await?;

        tracing::info!(audit_id = %id, "Inventory audit deleted");
        Ok(())
    }
}
