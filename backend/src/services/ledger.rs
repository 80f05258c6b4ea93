//! Ledger engine
//!
//! Executes document creation and status transitions together with their
//! stock and cost side effects. Every command runs in one unit of work:
//! either all of its writes commit or none do.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use shared::{
    aggregate_by_product, checked_total, sale_total, validate_counted_quantity,
    validate_distinct_warehouses, validate_document_total, validate_has_lines, validate_price,
    validate_unique_products, AuditEffect, AuditStatus,
    DocumentStatus, InventoryAudit, NewInventoryAudit, NewPurchaseItem, NewPurchaseOrder,
    NewSalesItem, NewSalesOrder, NewTransferItem, NewTransferOrder, PurchaseEffect,
    PurchaseOrder, PurchaseStatus, SaleEffect, SaleStatus, SalesOrder, StockEntry, StockFilter,
    StockKey, Supplier, TransferEffect, TransferOrder, TransferStatus, Warehouse,
};

use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, UnitOfWork};

/// Ledger engine over a transactional store
#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Purchase orders
    // ========================================================================

    /// Create a purchase order in DRAFT
    pub async fn create_purchase(&self, input: NewPurchaseOrder) -> AppResult<PurchaseOrder> {
        validate_purchase_lines(&input.items)?;

        let mut uow = self.store.begin().await?;
        require_active_supplier(uow.as_mut(), input.supplier_id).await?;
        require_active_warehouse(uow.as_mut(), input.warehouse_id, "warehouseId").await?;
        require_products(uow.as_mut(), input.items.iter().map(|i| i.product_id)).await?;

        let now = Utc::now();
        let order = PurchaseOrder {
            id: Uuid::new_v4(),
            supplier_id: input.supplier_id,
            warehouse_id: input.warehouse_id,
            status: PurchaseStatus::Draft,
            notes: input.notes,
            items: input.items.into_iter().map(NewPurchaseItem::into_item).collect(),
            created_at: now,
            updated_at: now,
        };
        uow.insert_purchase(&order).await?;
        uow.commit().await?;

        tracing::info!(purchase_id = %order.id, "Purchase order created");
        Ok(order)
    }

    /// Move a purchase order to `to`, receiving its lines into stock on RECEIVED
    pub async fn transition_purchase(&self, id: Uuid, to: PurchaseStatus) -> AppResult<PurchaseOrder> {
        let mut uow = self.store.begin().await?;
        let mut order = uow
            .get_purchase(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

        let from = order.status;
        let rule = check_transition(id, from, to)?;

        match rule.effect {
            PurchaseEffect::NoStockChange => {}
            PurchaseEffect::ReceiveIntoStock => {
                validate_has_lines(&order.items).map_err(|m| AppError::validation("items", m))?;
                require_active_warehouse(uow.as_mut(), order.warehouse_id, "warehouseId").await?;
                let demand =
                    aggregate_by_product(order.items.iter().map(|i| (i.product_id, i.quantity)));
                receive_stock(uow.as_mut(), order.warehouse_id, &demand).await?;

                // Last line wins when a product repeats; rows are updated in
                // product order like the stock entries
                let costs: BTreeMap<Uuid, Decimal> = order
                    .items
                    .iter()
                    .map(|i| (i.product_id, i.unit_price))
                    .collect();
                for (product_id, unit_price) in costs {
                    uow.set_cost_price(product_id, unit_price).await?;
                }
                for item in order.items.iter_mut() {
                    item.received_quantity = item.quantity;
                }
            }
        }

        order.status = to;
        order.updated_at = Utc::now();
        uow.update_purchase(&order).await?;
        uow.commit().await?;

        tracing::info!(purchase_id = %id, from = %from, to = %to, "Purchase order transitioned");
        Ok(order)
    }

    // ========================================================================
    // Sales orders
    // ========================================================================

    /// Create a sale. Unless created as DRAFT the sale completes immediately
    /// and every line is issued from stock.
    pub async fn create_sale(&self, input: NewSalesOrder) -> AppResult<SalesOrder> {
        let warehouse_id = input
            .warehouse_id
            .ok_or_else(|| AppError::validation("warehouseId", "Warehouse is required"))?;
        let items = match input.items {
            Some(items) if !items.is_empty() => items,
            _ => return Err(AppError::validation("items", "At least one line item is required")),
        };
        validate_sale_lines(&items)?;

        let status = input.status.unwrap_or(SaleStatus::Completed);
        let effect = status.creation_effect().ok_or_else(|| {
            AppError::validation("status", format!("A sale cannot be created as {}", status))
        })?;

        let mut uow = self.store.begin().await?;
        require_active_warehouse(uow.as_mut(), warehouse_id, "warehouseId").await?;
        require_products(uow.as_mut(), items.iter().map(|i| i.product_id)).await?;

        let items: Vec<_> = items.into_iter().map(NewSalesItem::into_item).collect();
        let total_amount = document_total(sale_total(&items))?;
        if effect == SaleEffect::IssueFromStock {
            let demand = aggregate_by_product(items.iter().map(|i| (i.product_id, i.quantity)));
            issue_stock(uow.as_mut(), warehouse_id, &demand).await?;
        }

        let now = Utc::now();
        let order = SalesOrder {
            id: Uuid::new_v4(),
            warehouse_id,
            status,
            customer_name: input.customer_name,
            notes: input.notes,
            total_amount,
            items,
            created_at: now,
            updated_at: now,
        };
        uow.insert_sale(&order).await?;
        uow.commit().await?;

        tracing::info!(sale_id = %order.id, status = %order.status, "Sales order created");
        Ok(order)
    }

    /// Move a DRAFT sale to COMPLETED or CANCELLED
    pub async fn transition_sale(&self, id: Uuid, to: SaleStatus) -> AppResult<SalesOrder> {
        let mut uow = self.store.begin().await?;
        let mut order = uow
            .get_sale(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;

        let from = order.status;
        let rule = check_transition(id, from, to)?;

        if rule.effect == SaleEffect::IssueFromStock {
            validate_has_lines(&order.items).map_err(|m| AppError::validation("items", m))?;
            require_active_warehouse(uow.as_mut(), order.warehouse_id, "warehouseId").await?;
            let demand =
                aggregate_by_product(order.items.iter().map(|i| (i.product_id, i.quantity)));
            issue_stock(uow.as_mut(), order.warehouse_id, &demand).await?;
        }

        order.status = to;
        order.updated_at = Utc::now();
        uow.update_sale(&order).await?;
        uow.commit().await?;

        tracing::info!(sale_id = %id, from = %from, to = %to, "Sales order transitioned");
        Ok(order)
    }

    // ========================================================================
    // Transfer orders
    // ========================================================================

    /// Create a transfer order in DRAFT
    pub async fn create_transfer(&self, input: NewTransferOrder) -> AppResult<TransferOrder> {
        validate_distinct_warehouses(input.source_warehouse_id, input.dest_warehouse_id)
            .map_err(|m| AppError::validation("destWarehouseId", m))?;
        validate_transfer_lines(&input.items)?;

        let mut uow = self.store.begin().await?;
        require_active_warehouse(uow.as_mut(), input.source_warehouse_id, "sourceWarehouseId")
            .await?;
        require_active_warehouse(uow.as_mut(), input.dest_warehouse_id, "destWarehouseId").await?;
        require_products(uow.as_mut(), input.items.iter().map(|i| i.product_id)).await?;

        let now = Utc::now();
        let order = TransferOrder {
            id: Uuid::new_v4(),
            source_warehouse_id: input.source_warehouse_id,
            dest_warehouse_id: input.dest_warehouse_id,
            status: TransferStatus::Draft,
            notes: input.notes,
            items: input.items.into_iter().map(NewTransferItem::into_item).collect(),
            created_at: now,
            updated_at: now,
        };
        uow.insert_transfer(&order).await?;
        uow.commit().await?;

        tracing::info!(transfer_id = %order.id, "Transfer order created");
        Ok(order)
    }

    /// Move a transfer order to `to`, reserving, delivering or releasing stock
    pub async fn transition_transfer(&self, id: Uuid, to: TransferStatus) -> AppResult<TransferOrder> {
        let mut uow = self.store.begin().await?;
        let mut order = uow
            .get_transfer(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer order".to_string()))?;

        let from = order.status;
        let rule = check_transition(id, from, to)?;
        let demand = aggregate_by_product(order.items.iter().map(|i| (i.product_id, i.quantity)));

        match rule.effect {
            TransferEffect::NoStockChange => {}
            TransferEffect::ReserveAtSource => {
                validate_has_lines(&order.items).map_err(|m| AppError::validation("items", m))?;
                require_active_warehouse(
                    uow.as_mut(),
                    order.source_warehouse_id,
                    "sourceWarehouseId",
                )
                .await?;
                require_active_warehouse(uow.as_mut(), order.dest_warehouse_id, "destWarehouseId")
                    .await?;
                issue_stock(uow.as_mut(), order.source_warehouse_id, &demand).await?;
            }
            TransferEffect::DeliverToDestination => {
                require_active_warehouse(uow.as_mut(), order.dest_warehouse_id, "destWarehouseId")
                    .await?;
                receive_stock(uow.as_mut(), order.dest_warehouse_id, &demand).await?;
            }
            // Reserved stock always goes back, even to an inactive warehouse
            TransferEffect::ReleaseToSource => {
                receive_stock(uow.as_mut(), order.source_warehouse_id, &demand).await?;
            }
        }

        order.status = to;
        order.updated_at = Utc::now();
        uow.update_transfer(&order).await?;
        uow.commit().await?;

        tracing::info!(transfer_id = %id, from = %from, to = %to, "Transfer order transitioned");
        Ok(order)
    }

    // ========================================================================
    // Inventory audits
    // ========================================================================

    /// Create an audit in DRAFT over one warehouse
    pub async fn create_audit(&self, input: NewInventoryAudit) -> AppResult<InventoryAudit> {
        validate_has_lines(&input.items).map_err(|m| AppError::validation("items", m))?;
        validate_unique_products(input.items.iter().map(|i| i.product_id))
            .map_err(|m| AppError::validation("items", m))?;
        for item in &input.items {
            if let Some(actual) = item.actual_quantity {
                validate_counted_quantity(actual)
                    .map_err(|m| AppError::validation("actualQuantity", m))?;
            }
        }

        let mut uow = self.store.begin().await?;
        require_active_warehouse(uow.as_mut(), input.warehouse_id, "warehouseId").await?;
        require_products(uow.as_mut(), input.items.iter().map(|i| i.product_id)).await?;

        let now = Utc::now();
        let audit = InventoryAudit {
            id: Uuid::new_v4(),
            warehouse_id: input.warehouse_id,
            status: AuditStatus::Draft,
            notes: input.notes,
            items: input.items.into_iter().map(|i| i.into_item()).collect(),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        uow.insert_audit(&audit).await?;
        uow.commit().await?;

        tracing::info!(audit_id = %audit.id, "Inventory audit created");
        Ok(audit)
    }

    /// Start an audit (snapshot system quantities) or complete it
    /// (overwrite stock with counted quantities)
    pub async fn transition_audit(&self, id: Uuid, to: AuditStatus) -> AppResult<InventoryAudit> {
        let mut uow = self.store.begin().await?;
        let mut audit = uow
            .get_audit(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory audit".to_string()))?;

        let from = audit.status;
        let rule = check_transition(id, from, to)?;
        let now = Utc::now();

        // Lines hold unique products; lock their entries in product order
        let mut visit: Vec<usize> = (0..audit.items.len()).collect();
        visit.sort_by_key(|&i| audit.items[i].product_id);

        match rule.effect {
            AuditEffect::SnapshotSystemQuantities => {
                for &i in &visit {
                    let key = StockKey::new(audit.items[i].product_id, audit.warehouse_id);
                    audit.items[i].system_quantity = uow.get_stock(key).await?;
                }
                audit.started_at = Some(now);
            }
            AuditEffect::ReconcileToActual => {
                require_active_warehouse(uow.as_mut(), audit.warehouse_id, "warehouseId").await?;
                if let Some(missing) = audit.items.iter().find(|i| i.actual_quantity.is_none()) {
                    tracing::warn!(audit_id = %id, item_id = %missing.id, "Audit line not counted");
                    return Err(AppError::validation(
                        "actualQuantity",
                        "Every line must be counted before the audit is completed",
                    ));
                }
                for &i in &visit {
                    let item = &mut audit.items[i];
                    let key = StockKey::new(item.product_id, audit.warehouse_id);
                    uow.set_stock(key, item.actual_quantity.unwrap_or_default())
                        .await?;
                    item.discrepancy = item.compute_discrepancy();
                }
                audit.completed_at = Some(now);
            }
        }

        audit.status = to;
        audit.updated_at = now;
        uow.update_audit(&audit).await?;
        uow.commit().await?;

        tracing::info!(audit_id = %id, from = %from, to = %to, "Inventory audit transitioned");
        Ok(audit)
    }

    // ========================================================================
    // Stock
    // ========================================================================

    /// Read stock entries, optionally narrowed to one product or warehouse
    pub async fn stock_levels(&self, filter: &StockFilter) -> AppResult<Vec<StockEntry>> {
        let mut uow = self.store.begin().await?;
        let entries = uow.list_stock(filter).await?;
        Ok(entries)
    }
}

// ============================================================================
// Transition and stock helpers
// ============================================================================

/// Look up the transition rule or reject the request
fn check_transition<S: DocumentStatus>(
    id: Uuid,
    current: S,
    requested: S,
) -> AppResult<&'static shared::TransitionRule<S, S::Effect>> {
    current.rule_to(requested).ok_or_else(|| {
        tracing::warn!(
            document = S::DOCUMENT,
            id = %id,
            current = %current,
            requested = %requested,
            "Rejected status transition"
        );
        AppError::InvalidStateTransition {
            document: S::DOCUMENT.to_string(),
            id,
            current: current.to_string(),
            requested: requested.to_string(),
        }
    })
}

/// Take `demand` out of one warehouse. Every line is checked before any is
/// decremented, so a shortfall leaves stock untouched.
pub(crate) async fn issue_stock(
    uow: &mut dyn UnitOfWork,
    warehouse_id: Uuid,
    demand: &BTreeMap<Uuid, i64>,
) -> AppResult<()> {
    for (&product_id, &requested) in demand {
        let available = uow.get_stock(StockKey::new(product_id, warehouse_id)).await?;
        if available < requested {
            tracing::warn!(
                product_id = %product_id,
                warehouse_id = %warehouse_id,
                available,
                requested,
                "Insufficient stock"
            );
            return Err(AppError::InsufficientStock {
                product_id,
                available,
                requested,
            });
        }
    }

    for (&product_id, &quantity) in demand {
        uow.adjust_stock(StockKey::new(product_id, warehouse_id), -quantity)
            .await?;
    }
    Ok(())
}

/// Add `demand` to one warehouse
pub(crate) async fn receive_stock(
    uow: &mut dyn UnitOfWork,
    warehouse_id: Uuid,
    demand: &BTreeMap<Uuid, i64>,
) -> AppResult<()> {
    for (&product_id, &quantity) in demand {
        uow.adjust_stock(StockKey::new(product_id, warehouse_id), quantity)
            .await?;
    }
    Ok(())
}

// ============================================================================
// Structural checks
// ============================================================================

pub(crate) fn validate_purchase_lines(items: &[NewPurchaseItem]) -> AppResult<()> {
    validate_has_lines(items).map_err(|m| AppError::validation("items", m))?;
    for item in items {
        item.validate()?;
        validate_price(item.unit_price).map_err(|m| AppError::validation("unitPrice", m))?;
    }
    document_total(checked_total(items.iter().map(|i| (i.unit_price, i.quantity))))?;
    Ok(())
}

pub(crate) fn validate_sale_lines(items: &[NewSalesItem]) -> AppResult<()> {
    validate_has_lines(items).map_err(|m| AppError::validation("items", m))?;
    for item in items {
        item.validate()?;
        validate_price(item.unit_price).map_err(|m| AppError::validation("unitPrice", m))?;
    }
    document_total(checked_total(items.iter().map(|i| (i.unit_price, i.quantity))))?;
    Ok(())
}

/// A document total that fits the money columns
pub(crate) fn document_total(total: Option<Decimal>) -> AppResult<Decimal> {
    validate_document_total(total).map_err(|m| AppError::validation("items", m))
}

pub(crate) fn validate_transfer_lines(items: &[NewTransferItem]) -> AppResult<()> {
    validate_has_lines(items).map_err(|m| AppError::validation("items", m))?;
    for item in items {
        item.validate()?;
    }
    Ok(())
}

// ============================================================================
// Reference checks
// ============================================================================

pub(crate) async fn require_active_warehouse(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
    field: &str,
) -> AppResult<Warehouse> {
    let warehouse = uow
        .get_warehouse(id)
        .await?
        .ok_or_else(|| AppError::validation(field, format!("Unknown warehouse {}", id)))?;
    if !warehouse.status.is_active() {
        return Err(AppError::validation(field, format!("Warehouse {} is inactive", id)));
    }
    Ok(warehouse)
}

pub(crate) async fn require_active_supplier(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<Supplier> {
    let supplier = uow
        .get_supplier(id)
        .await?
        .ok_or_else(|| AppError::validation("supplierId", format!("Unknown supplier {}", id)))?;
    if !supplier.status.is_active() {
        return Err(AppError::validation(
            "supplierId",
            format!("Supplier {} is inactive", id),
        ));
    }
    Ok(supplier)
}

pub(crate) async fn require_products<I>(uow: &mut dyn UnitOfWork, product_ids: I) -> AppResult<()>
where
    I: IntoIterator<Item = Uuid>,
{
    let ids: Vec<Uuid> = aggregate_by_product(product_ids.into_iter().map(|id| (id, 0)))
        .into_keys()
        .collect();
    for id in ids {
        if uow.get_product(id).await?.is_none() {
            return Err(AppError::validation("productId", format!("Unknown product {}", id)));
        }
    }
    Ok(())
}
