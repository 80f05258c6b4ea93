//! Ledger engine tests
//!
//! Tests for document transitions and their stock side effects including:
//! - Sale atomicity and stock sufficiency
//! - Purchase receipt with cost update
//! - Transfer reservation, delivery and release
//! - Audit reconciliation
//! - Document locking and concurrency

mod common;

use chrono::Utc;
use uuid::Uuid;

use common::{dec, Ledger};
use retail_inventory_backend::{store::DocumentRepository, AppError};
use shared::{
    ActivityStatus, AuditCounts, AuditStatus, CountedLine, DocumentFilter, DocumentOrder,
    NewAuditItem, NewCategory, NewInventoryAudit, NewProduct, NewSalesOrder, NewSupplier,
    NewWarehouse, PurchaseOrderPatch, PurchaseReceipt, PurchaseStatus, ReceivedLine, SaleStatus,
    SalesOrderPatch, TransferItem, TransferOrder, TransferOrderPatch, TransferStatus,
};

async fn inactive_warehouse(ledger: &Ledger) -> Uuid {
    ledger
        .catalog
        .create_warehouse(NewWarehouse {
            name: "Closed".to_string(),
            location: None,
            status: ActivityStatus::Inactive,
        })
        .await
        .unwrap()
        .id
}

fn validation_field(result: Result<impl std::fmt::Debug, AppError>) -> String {
    match result {
        Err(AppError::Validation { field, .. }) => field,
        other => panic!("expected Validation, got {:?}", other),
    }
}

// ============================================================================
// Sales
// ============================================================================

#[tokio::test]
async fn test_sale_decrements_stock() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;

    let sale = ledger
        .engine
        .create_sale(ledger.sale(ledger.w1, &[(ledger.p1, 3)]))
        .await
        .unwrap();

    assert_eq!(sale.status, SaleStatus::Completed);
    assert_eq!(sale.total_amount, dec("29.97"));
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 7);
}

#[tokio::test]
async fn test_sale_beyond_stock_is_rejected_and_leaves_stock() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 5).await;

    let err = ledger
        .engine
        .create_sale(ledger.sale(ledger.w1, &[(ledger.p1, 8)]))
        .await
        .unwrap_err();

    match &err {
        AppError::InsufficientStock {
            product_id,
            available,
            requested,
        } => {
            assert_eq!(*product_id, ledger.p1);
            assert_eq!(*available, 5);
            assert_eq!(*requested, 8);
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }
    assert_eq!(
        err.to_string(),
        format!(
            "Insufficient stock for product {}. Available: 5, Requested: 8",
            ledger.p1
        )
    );
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 5);

    let sales = ledger
        .documents
        .list_sales(&DocumentFilter::default())
        .await
        .unwrap();
    assert!(sales.is_empty());
}

#[tokio::test]
async fn test_sale_failing_on_one_line_applies_no_line() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;
    ledger.seed(ledger.p2, ledger.w1, 1).await;
    ledger.seed(ledger.p3, ledger.w1, 10).await;

    let result = ledger
        .engine
        .create_sale(ledger.sale(
            ledger.w1,
            &[(ledger.p1, 3), (ledger.p2, 2), (ledger.p3, 4)],
        ))
        .await;

    assert!(matches!(
        result,
        Err(AppError::InsufficientStock { requested: 2, available: 1, .. })
    ));
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 10);
    assert_eq!(ledger.stock(ledger.p2, ledger.w1).await, 1);
    assert_eq!(ledger.stock(ledger.p3, ledger.w1).await, 10);
}

#[tokio::test]
async fn test_duplicate_lines_are_summed_before_the_check() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 5).await;

    let result = ledger
        .engine
        .create_sale(ledger.sale(ledger.w1, &[(ledger.p1, 3), (ledger.p1, 3)]))
        .await;

    assert!(matches!(
        result,
        Err(AppError::InsufficientStock { available: 5, requested: 6, .. })
    ));
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 5);
}

#[tokio::test]
async fn test_sale_requires_warehouse_and_items() {
    let ledger = Ledger::new().await;

    let mut no_warehouse = ledger.sale(ledger.w1, &[(ledger.p1, 1)]);
    no_warehouse.warehouse_id = None;
    match ledger.engine.create_sale(no_warehouse).await {
        Err(AppError::Validation { field, .. }) => assert_eq!(field, "warehouseId"),
        other => panic!("expected Validation, got {:?}", other),
    }

    let no_items = NewSalesOrder {
        warehouse_id: Some(ledger.w1),
        items: Some(vec![]),
        ..Default::default()
    };
    match ledger.engine.create_sale(no_items).await {
        Err(AppError::Validation { field, .. }) => assert_eq!(field, "items"),
        other => panic!("expected Validation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sale_with_non_positive_quantity_is_rejected() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 5).await;

    let result = ledger
        .engine
        .create_sale(ledger.sale(ledger.w1, &[(ledger.p1, 0)]))
        .await;

    assert!(matches!(result, Err(AppError::Validation { .. })));
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 5);
}

#[tokio::test]
async fn test_draft_sale_issues_stock_only_on_completion() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;

    let mut input = ledger.sale(ledger.w1, &[(ledger.p1, 4)]);
    input.status = Some(SaleStatus::Draft);
    let draft = ledger.engine.create_sale(input).await.unwrap();
    assert_eq!(draft.status, SaleStatus::Draft);
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 10);

    let completed = ledger
        .engine
        .transition_sale(draft.id, SaleStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, SaleStatus::Completed);
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 6);

    let again = ledger
        .engine
        .transition_sale(draft.id, SaleStatus::Cancelled)
        .await;
    assert!(matches!(again, Err(AppError::InvalidStateTransition { .. })));
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 6);
}

#[tokio::test]
async fn test_oversized_sale_lines_are_rejected() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;

    let mut huge = ledger.sale(ledger.w1, &[(ledger.p1, i64::MAX)]);
    huge.status = Some(SaleStatus::Draft);
    if let Some(items) = huge.items.as_mut() {
        items[0].unit_price = dec("10000000000000");
    }
    assert_eq!(validation_field(ledger.engine.create_sale(huge).await), "quantity");

    // Each line fits its columns but the total does not
    let mut wide = ledger.sale(ledger.w1, &[(ledger.p1, 1_000_000_000)]);
    wide.status = Some(SaleStatus::Draft);
    if let Some(items) = wide.items.as_mut() {
        items[0].unit_price = dec("99999999999999");
    }
    assert_eq!(validation_field(ledger.engine.create_sale(wide).await), "items");

    let draft = ledger
        .engine
        .create_sale(NewSalesOrder {
            status: Some(SaleStatus::Draft),
            ..ledger.sale(ledger.w1, &[(ledger.p1, 1)])
        })
        .await
        .unwrap();
    let mut patch_items = ledger
        .sale(ledger.w1, &[(ledger.p1, 1_000_000_000)])
        .items
        .unwrap();
    patch_items[0].unit_price = dec("99999999999999");
    let patched = ledger
        .documents
        .update_sale(
            draft.id,
            SalesOrderPatch {
                items: Some(patch_items),
                ..Default::default()
            },
        )
        .await;
    assert_eq!(validation_field(patched), "items");

    let sales = ledger
        .documents
        .list_sales(&DocumentFilter::default())
        .await
        .unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].total_amount, dec("9.99"));
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 10);
}

#[tokio::test]
async fn test_update_sale_is_limited_to_draft() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;

    let completed = ledger
        .engine
        .create_sale(ledger.sale(ledger.w1, &[(ledger.p1, 1)]))
        .await
        .unwrap();
    let locked = ledger
        .documents
        .update_sale(
            completed.id,
            SalesOrderPatch {
                notes: Some("late note".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(locked, Err(AppError::DocumentLocked(_))));

    let mut input = ledger.sale(ledger.w1, &[(ledger.p1, 1)]);
    input.status = Some(SaleStatus::Draft);
    let draft = ledger.engine.create_sale(input).await.unwrap();
    ledger
        .engine
        .transition_sale(draft.id, SaleStatus::Cancelled)
        .await
        .unwrap();
    let locked = ledger
        .documents
        .update_sale(draft.id, SalesOrderPatch::default())
        .await;
    assert!(matches!(locked, Err(AppError::DocumentLocked(_))));
}

// ============================================================================
// Purchases
// ============================================================================

#[tokio::test]
async fn test_received_purchase_adds_stock_and_sets_cost() {
    let ledger = Ledger::new().await;
    let order = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p2, 10, "12.00")]))
        .await
        .unwrap();
    assert_eq!(order.status, PurchaseStatus::Draft);

    ledger
        .engine
        .transition_purchase(order.id, PurchaseStatus::Ordered)
        .await
        .unwrap();
    assert_eq!(ledger.stock(ledger.p2, ledger.w1).await, 0);

    let received = ledger
        .engine
        .transition_purchase(order.id, PurchaseStatus::Received)
        .await
        .unwrap();

    assert_eq!(received.status, PurchaseStatus::Received);
    assert_eq!(received.items[0].received_quantity, 10);
    assert_eq!(ledger.stock(ledger.p2, ledger.w1).await, 10);
    assert_eq!(ledger.cost_price(ledger.p2).await, dec("12.00"));
}

#[tokio::test]
async fn test_receiving_twice_fails_and_applies_once() {
    let ledger = Ledger::new().await;
    let order = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p2, 10, "12.00")]))
        .await
        .unwrap();
    ledger
        .engine
        .transition_purchase(order.id, PurchaseStatus::Ordered)
        .await
        .unwrap();
    ledger
        .engine
        .transition_purchase(order.id, PurchaseStatus::Received)
        .await
        .unwrap();

    let second = ledger
        .engine
        .transition_purchase(order.id, PurchaseStatus::Received)
        .await;

    match second {
        Err(AppError::InvalidStateTransition {
            current, requested, ..
        }) => {
            assert_eq!(current, "RECEIVED");
            assert_eq!(requested, "RECEIVED");
        }
        other => panic!("expected InvalidStateTransition, got {:?}", other),
    }
    assert_eq!(ledger.stock(ledger.p2, ledger.w1).await, 10);
    assert_eq!(ledger.cost_price(ledger.p2).await, dec("12.00"));
}

#[tokio::test]
async fn test_draft_purchase_cannot_skip_ordering() {
    let ledger = Ledger::new().await;
    let order = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p1, 5, "3.00")]))
        .await
        .unwrap();

    let result = ledger
        .engine
        .transition_purchase(order.id, PurchaseStatus::Received)
        .await;

    assert!(matches!(result, Err(AppError::InvalidStateTransition { .. })));
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 0);
}

#[tokio::test]
async fn test_later_receipt_wins_cost_price() {
    let ledger = Ledger::new().await;
    let first = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p1, 1, "8.00")]))
        .await
        .unwrap();
    let second = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p1, 1, "6.50")]))
        .await
        .unwrap();

    for id in [first.id, second.id] {
        ledger
            .engine
            .transition_purchase(id, PurchaseStatus::Ordered)
            .await
            .unwrap();
    }
    // Received in reverse order of creation
    ledger
        .engine
        .transition_purchase(second.id, PurchaseStatus::Received)
        .await
        .unwrap();
    ledger
        .engine
        .transition_purchase(first.id, PurchaseStatus::Received)
        .await
        .unwrap();

    assert_eq!(ledger.cost_price(ledger.p1).await, dec("8.00"));
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 2);
}

#[tokio::test]
async fn test_purchase_edits_are_limited_to_draft() {
    let ledger = Ledger::new().await;
    let order = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p1, 5, "3.00")]))
        .await
        .unwrap();

    let updated = ledger
        .documents
        .update_purchase(
            order.id,
            PurchaseOrderPatch {
                notes: Some("call before delivery".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.notes.as_deref(), Some("call before delivery"));
    assert_eq!(updated.items[0].product.as_ref().map(|p| p.id), Some(ledger.p1));

    ledger
        .engine
        .transition_purchase(order.id, PurchaseStatus::Ordered)
        .await
        .unwrap();
    let locked = ledger
        .documents
        .update_purchase(order.id, PurchaseOrderPatch::default())
        .await;
    assert!(matches!(locked, Err(AppError::DocumentLocked(_))));
}

#[tokio::test]
async fn test_purchase_can_be_cancelled_before_receipt() {
    let ledger = Ledger::new().await;

    let draft = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p1, 5, "3.00")]))
        .await
        .unwrap();
    let cancelled = ledger
        .engine
        .transition_purchase(draft.id, PurchaseStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, PurchaseStatus::Cancelled);

    let ordered = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p1, 5, "3.00")]))
        .await
        .unwrap();
    ledger
        .engine
        .transition_purchase(ordered.id, PurchaseStatus::Ordered)
        .await
        .unwrap();
    let cancelled = ledger
        .engine
        .transition_purchase(ordered.id, PurchaseStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, PurchaseStatus::Cancelled);

    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 0);
    assert_eq!(ledger.cost_price(ledger.p1).await, dec("5.00"));
}

#[tokio::test]
async fn test_received_purchase_cannot_be_cancelled() {
    let ledger = Ledger::new().await;
    let order = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p1, 5, "3.00")]))
        .await
        .unwrap();
    for to in [PurchaseStatus::Ordered, PurchaseStatus::Received] {
        ledger.engine.transition_purchase(order.id, to).await.unwrap();
    }

    let result = ledger
        .engine
        .transition_purchase(order.id, PurchaseStatus::Cancelled)
        .await;
    match result {
        Err(AppError::InvalidStateTransition {
            current, requested, ..
        }) => {
            assert_eq!(current, "RECEIVED");
            assert_eq!(requested, "CANCELLED");
        }
        other => panic!("expected InvalidStateTransition, got {:?}", other),
    }
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 5);
}

#[tokio::test]
async fn test_receipts_are_recorded_only_on_ordered_purchases() {
    let ledger = Ledger::new().await;
    let order = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p1, 5, "3.00")]))
        .await
        .unwrap();
    let item_id = order.items[0].id;
    let receipt = |received_quantity| PurchaseReceipt {
        lines: vec![ReceivedLine {
            item_id,
            received_quantity,
        }],
    };

    let draft = ledger
        .documents
        .record_purchase_receipt(order.id, receipt(2))
        .await;
    assert!(matches!(draft, Err(AppError::DocumentLocked(_))));

    ledger
        .engine
        .transition_purchase(order.id, PurchaseStatus::Ordered)
        .await
        .unwrap();
    let recorded = ledger
        .documents
        .record_purchase_receipt(order.id, receipt(2))
        .await
        .unwrap();
    assert_eq!(recorded.items[0].line.received_quantity, 2);
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 0);

    let over = ledger
        .documents
        .record_purchase_receipt(order.id, receipt(6))
        .await;
    assert_eq!(validation_field(over), "receivedQuantity");
    let stored = ledger.documents.get_purchase(order.id).await.unwrap();
    assert_eq!(stored.items[0].line.received_quantity, 2);
}

#[tokio::test]
async fn test_repeated_product_takes_cost_of_its_last_line() {
    let ledger = Ledger::new().await;
    let order = ledger
        .engine
        .create_purchase(ledger.purchase(
            ledger.w1,
            &[(ledger.p2, 1, "7.00"), (ledger.p1, 2, "3.00"), (ledger.p2, 3, "8.00")],
        ))
        .await
        .unwrap();
    for to in [PurchaseStatus::Ordered, PurchaseStatus::Received] {
        ledger.engine.transition_purchase(order.id, to).await.unwrap();
    }

    assert_eq!(ledger.cost_price(ledger.p2).await, dec("8.00"));
    assert_eq!(ledger.cost_price(ledger.p1).await, dec("3.00"));
    assert_eq!(ledger.stock(ledger.p2, ledger.w1).await, 4);
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 2);
}

#[tokio::test]
async fn test_oversized_purchase_lines_are_rejected() {
    let ledger = Ledger::new().await;

    let huge = ledger.purchase(ledger.w1, &[(ledger.p1, i64::MAX, "10000000000000")]);
    assert_eq!(validation_field(ledger.engine.create_purchase(huge).await), "quantity");

    let pricey = ledger.purchase(ledger.w1, &[(ledger.p1, 1, "1000000000000000")]);
    assert_eq!(validation_field(ledger.engine.create_purchase(pricey).await), "unitPrice");

    let wide = ledger.purchase(ledger.w1, &[(ledger.p1, 1_000_000_000, "99999999999999")]);
    assert_eq!(validation_field(ledger.engine.create_purchase(wide).await), "items");

    let purchases = ledger
        .documents
        .list_purchases(&DocumentFilter::default())
        .await
        .unwrap();
    assert!(purchases.is_empty());
}

#[tokio::test]
async fn test_documents_need_active_references() {
    let ledger = Ledger::new().await;
    let closed = inactive_warehouse(&ledger).await;
    let dormant = ledger
        .catalog
        .create_supplier(NewSupplier {
            name: "Dormant Traders".to_string(),
            email: None,
            phone: None,
            status: ActivityStatus::Inactive,
        })
        .await
        .unwrap()
        .id;

    let into_closed = ledger.purchase(closed, &[(ledger.p1, 1, "1.00")]);
    assert_eq!(
        validation_field(ledger.engine.create_purchase(into_closed).await),
        "warehouseId"
    );

    let mut from_dormant = ledger.purchase(ledger.w1, &[(ledger.p1, 1, "1.00")]);
    from_dormant.supplier_id = dormant;
    assert_eq!(
        validation_field(ledger.engine.create_purchase(from_dormant).await),
        "supplierId"
    );

    let unknown = ledger.purchase(ledger.w1, &[(Uuid::new_v4(), 1, "1.00")]);
    assert_eq!(
        validation_field(ledger.engine.create_purchase(unknown).await),
        "productId"
    );

    ledger.seed(ledger.p1, closed, 5).await;
    let sale = ledger.sale(closed, &[(ledger.p1, 1)]);
    assert_eq!(validation_field(ledger.engine.create_sale(sale).await), "warehouseId");
    let sale = ledger.sale(ledger.w1, &[(Uuid::new_v4(), 1)]);
    assert_eq!(validation_field(ledger.engine.create_sale(sale).await), "productId");
    assert_eq!(ledger.stock(ledger.p1, closed).await, 5);
}

// ============================================================================
// Transfers
// ============================================================================

#[tokio::test]
async fn test_transfer_moves_stock_between_warehouses() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p3, ledger.w1, 10).await;

    let order = ledger
        .engine
        .create_transfer(ledger.transfer(ledger.w1, ledger.w2, &[(ledger.p3, 4)]))
        .await
        .unwrap();
    assert_eq!(ledger.stock(ledger.p3, ledger.w1).await, 10);

    ledger
        .engine
        .transition_transfer(order.id, TransferStatus::Pending)
        .await
        .unwrap();
    assert_eq!(ledger.stock(ledger.p3, ledger.w1).await, 6);
    assert_eq!(ledger.stock(ledger.p3, ledger.w2).await, 0);

    let done = ledger
        .engine
        .transition_transfer(order.id, TransferStatus::Completed)
        .await
        .unwrap();
    assert_eq!(done.status, TransferStatus::Completed);

    let source = ledger.stock(ledger.p3, ledger.w1).await;
    let dest = ledger.stock(ledger.p3, ledger.w2).await;
    assert_eq!((source, dest), (6, 4));
    assert_eq!(source + dest, 10);
}

#[tokio::test]
async fn test_cancelled_pending_transfer_returns_stock_to_source() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;

    let order = ledger
        .engine
        .create_transfer(ledger.transfer(ledger.w1, ledger.w2, &[(ledger.p1, 7)]))
        .await
        .unwrap();
    ledger
        .engine
        .transition_transfer(order.id, TransferStatus::Pending)
        .await
        .unwrap();
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 3);

    ledger
        .engine
        .transition_transfer(order.id, TransferStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 10);
    assert_eq!(ledger.stock(ledger.p1, ledger.w2).await, 0);
}

#[tokio::test]
async fn test_transfer_reservation_needs_source_stock() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 2).await;

    let order = ledger
        .engine
        .create_transfer(ledger.transfer(ledger.w1, ledger.w2, &[(ledger.p1, 3)]))
        .await
        .unwrap();
    let result = ledger
        .engine
        .transition_transfer(order.id, TransferStatus::Pending)
        .await;
    assert!(matches!(result, Err(AppError::InsufficientStock { .. })));

    let unchanged = ledger.documents.get_transfer(order.id).await.unwrap();
    assert_eq!(unchanged.status, TransferStatus::Draft);
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 2);
}

#[tokio::test]
async fn test_transfer_within_one_warehouse_is_rejected() {
    let ledger = Ledger::new().await;
    let result = ledger
        .engine
        .create_transfer(ledger.transfer(ledger.w1, ledger.w1, &[(ledger.p1, 1)]))
        .await;
    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_update_transfer_is_limited_to_draft() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;

    let order = ledger
        .engine
        .create_transfer(ledger.transfer(ledger.w1, ledger.w2, &[(ledger.p1, 2)]))
        .await
        .unwrap();
    let edited = ledger
        .documents
        .update_transfer(
            order.id,
            TransferOrderPatch {
                notes: Some("fragile".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.notes.as_deref(), Some("fragile"));

    ledger
        .engine
        .transition_transfer(order.id, TransferStatus::Pending)
        .await
        .unwrap();
    let locked = ledger
        .documents
        .update_transfer(order.id, TransferOrderPatch::default())
        .await;
    assert!(matches!(locked, Err(AppError::DocumentLocked(_))));
}

#[tokio::test]
async fn test_stock_moves_recheck_the_warehouses_they_touch() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;
    let closed = inactive_warehouse(&ledger).await;
    ledger.seed(ledger.p1, closed, 10).await;

    // Orders written while their warehouse was still active
    let out_of_closed = stored_transfer(&ledger, closed, ledger.w2).await;
    let into_closed = stored_transfer(&ledger, ledger.w1, closed).await;
    let mut order = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p1, 4, "2.00")]))
        .await
        .unwrap();
    order.warehouse_id = closed;
    order.status = PurchaseStatus::Ordered;
    let mut uow = ledger.store.begin().await.unwrap();
    uow.update_purchase(&order).await.unwrap();
    uow.commit().await.unwrap();

    let reserve = ledger
        .engine
        .transition_transfer(out_of_closed, TransferStatus::Pending)
        .await;
    assert_eq!(validation_field(reserve), "sourceWarehouseId");
    let reserve = ledger
        .engine
        .transition_transfer(into_closed, TransferStatus::Pending)
        .await;
    assert_eq!(validation_field(reserve), "destWarehouseId");
    let receive = ledger
        .engine
        .transition_purchase(order.id, PurchaseStatus::Received)
        .await;
    assert_eq!(validation_field(receive), "warehouseId");

    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 10);
    assert_eq!(ledger.stock(ledger.p1, closed).await, 10);
    assert_eq!(ledger.cost_price(ledger.p1).await, dec("5.00"));
    let untouched = ledger.documents.get_transfer(out_of_closed).await.unwrap();
    assert_eq!(untouched.status, TransferStatus::Draft);
}

async fn stored_transfer(ledger: &Ledger, source: Uuid, dest: Uuid) -> Uuid {
    let now = Utc::now();
    let order = TransferOrder {
        id: Uuid::new_v4(),
        source_warehouse_id: source,
        dest_warehouse_id: dest,
        status: TransferStatus::Draft,
        notes: None,
        items: vec![TransferItem {
            id: Uuid::new_v4(),
            product_id: ledger.p1,
            quantity: 3,
        }],
        created_at: now,
        updated_at: now,
    };
    let mut uow = ledger.store.begin().await.unwrap();
    uow.insert_transfer(&order).await.unwrap();
    uow.commit().await.unwrap();
    order.id
}

// ============================================================================
// Audits
// ============================================================================

#[tokio::test]
async fn test_audit_reconciles_stock_to_counts() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;
    ledger.seed(ledger.p2, ledger.w1, 4).await;

    let audit = ledger
        .engine
        .create_audit(NewInventoryAudit {
            warehouse_id: ledger.w1,
            notes: None,
            items: vec![
                NewAuditItem {
                    product_id: ledger.p1,
                    actual_quantity: None,
                },
                NewAuditItem {
                    product_id: ledger.p2,
                    actual_quantity: None,
                },
            ],
        })
        .await
        .unwrap();

    let started = ledger
        .engine
        .transition_audit(audit.id, AuditStatus::InProgress)
        .await
        .unwrap();
    assert!(started.started_at.is_some());

    // Stock keeps moving while the count is under way
    ledger
        .engine
        .create_sale(ledger.sale(ledger.w1, &[(ledger.p1, 2)]))
        .await
        .unwrap();

    let counts = AuditCounts {
        counts: started
            .items
            .iter()
            .map(|item| CountedLine {
                item_id: item.id,
                actual_quantity: if item.product_id == ledger.p1 { 7 } else { 4 },
            })
            .collect(),
    };
    ledger
        .documents
        .record_audit_counts(audit.id, counts)
        .await
        .unwrap();

    let completed = ledger
        .engine
        .transition_audit(audit.id, AuditStatus::Completed)
        .await
        .unwrap();

    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 7);
    assert_eq!(ledger.stock(ledger.p2, ledger.w1).await, 4);
    for item in &completed.items {
        let actual = item.actual_quantity.unwrap();
        assert_eq!(item.discrepancy, Some(actual - item.system_quantity));
    }
    let p1_line = completed
        .items
        .iter()
        .find(|i| i.product_id == ledger.p1)
        .unwrap();
    assert_eq!(p1_line.system_quantity, 10);
    assert_eq!(p1_line.discrepancy, Some(-3));
}

#[tokio::test]
async fn test_audit_completion_requires_every_line_counted() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;

    let audit = ledger
        .engine
        .create_audit(NewInventoryAudit {
            warehouse_id: ledger.w1,
            notes: None,
            items: vec![NewAuditItem {
                product_id: ledger.p1,
                actual_quantity: None,
            }],
        })
        .await
        .unwrap();
    ledger
        .engine
        .transition_audit(audit.id, AuditStatus::InProgress)
        .await
        .unwrap();

    let result = ledger
        .engine
        .transition_audit(audit.id, AuditStatus::Completed)
        .await;
    assert!(matches!(result, Err(AppError::Validation { .. })));
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 10);
}

#[tokio::test]
async fn test_audit_cannot_complete_from_draft() {
    let ledger = Ledger::new().await;
    let audit = ledger
        .engine
        .create_audit(NewInventoryAudit {
            warehouse_id: ledger.w1,
            notes: None,
            items: vec![NewAuditItem {
                product_id: ledger.p1,
                actual_quantity: Some(3),
            }],
        })
        .await
        .unwrap();

    let result = ledger
        .engine
        .transition_audit(audit.id, AuditStatus::Completed)
        .await;
    assert!(matches!(result, Err(AppError::InvalidStateTransition { .. })));
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 0);
}

// ============================================================================
// Document locking
// ============================================================================

#[tokio::test]
async fn test_deletes_respect_locked_statuses() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;

    let sale = ledger
        .engine
        .create_sale(ledger.sale(ledger.w1, &[(ledger.p1, 1)]))
        .await
        .unwrap();
    assert!(matches!(
        ledger.documents.delete_sale(sale.id).await,
        Err(AppError::DocumentLocked(_))
    ));

    let transfer = ledger
        .engine
        .create_transfer(ledger.transfer(ledger.w1, ledger.w2, &[(ledger.p1, 1)]))
        .await
        .unwrap();
    ledger
        .engine
        .transition_transfer(transfer.id, TransferStatus::Pending)
        .await
        .unwrap();
    assert!(matches!(
        ledger.documents.delete_transfer(transfer.id).await,
        Err(AppError::DocumentLocked(_))
    ));
    let reserved = ledger.documents.get_transfer(transfer.id).await.unwrap();
    assert_eq!(reserved.items.len(), 1);

    let purchase = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p1, 1, "1.00")]))
        .await
        .unwrap();
    ledger.documents.delete_purchase(purchase.id).await.unwrap();
    assert!(matches!(
        ledger.documents.get_purchase(purchase.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_catalog_deletes_respect_references() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w2, 1).await;

    assert!(matches!(
        ledger.catalog.delete_warehouse(ledger.w2).await,
        Err(AppError::DocumentLocked(_))
    ));
    assert!(matches!(
        ledger.catalog.delete_supplier(ledger.supplier).await,
        Err(AppError::DocumentLocked(_))
    ));

    ledger.seed(ledger.p1, ledger.w2, 0).await;
    ledger.catalog.delete_warehouse(ledger.w2).await.unwrap();
    assert!(matches!(
        ledger.catalog.get_warehouse(ledger.w2).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_category_deletion_depends_on_status_and_use() {
    let ledger = Ledger::new().await;
    let category = |name: &str, status| NewCategory {
        name: name.to_string(),
        status,
    };
    let active = ledger
        .catalog
        .create_category(category("Beverages", ActivityStatus::Active))
        .await
        .unwrap();
    let retired = ledger
        .catalog
        .create_category(category("Seasonal", ActivityStatus::Inactive))
        .await
        .unwrap();
    let unused = ledger
        .catalog
        .create_category(category("Empty", ActivityStatus::Active))
        .await
        .unwrap();

    let mut products = Vec::new();
    for (sku, category_id) in [("C-001", active.id), ("C-002", retired.id)] {
        let product = ledger
            .catalog
            .create_product(NewProduct {
                sku: sku.to_string(),
                name: format!("Product {}", sku),
                category_id: Some(category_id),
                cost_price: dec("1.00"),
                selling_price: dec("2.00"),
                safety_stock: 0,
            })
            .await
            .unwrap();
        products.push(product.id);
    }

    assert!(matches!(
        ledger.catalog.delete_category(active.id).await,
        Err(AppError::DocumentLocked(_))
    ));
    let kept = ledger.catalog.get_product(products[0]).await.unwrap();
    assert_eq!(kept.category_id, Some(active.id));

    ledger.catalog.delete_category(retired.id).await.unwrap();
    let orphan = ledger.catalog.get_product(products[1]).await.unwrap();
    assert_eq!(orphan.category_id, None);

    ledger.catalog.delete_category(unused.id).await.unwrap();
    let remaining: Vec<Uuid> = ledger
        .catalog
        .list_categories()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(remaining, vec![active.id]);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_lists_are_most_recently_updated_first() {
    let ledger = Ledger::new().await;
    let older = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w1, &[(ledger.p1, 1, "1.00")]))
        .await
        .unwrap();
    let newer = ledger
        .engine
        .create_purchase(ledger.purchase(ledger.w2, &[(ledger.p2, 1, "1.00")]))
        .await
        .unwrap();

    let listed = ledger
        .documents
        .list_purchases(&DocumentFilter::default())
        .await
        .unwrap();
    assert_eq!(listed[0].id, newer.id);

    ledger
        .engine
        .transition_purchase(older.id, PurchaseStatus::Ordered)
        .await
        .unwrap();
    let listed = ledger
        .documents
        .list_purchases(&DocumentFilter::default())
        .await
        .unwrap();
    assert_eq!(listed[0].id, older.id);
    assert!(listed[0].supplier.is_some());
    assert_eq!(listed[0].warehouse.as_ref().map(|w| w.id), Some(ledger.w1));

    let oldest_first = ledger
        .documents
        .list_purchases(&DocumentFilter {
            order_by: DocumentOrder::CreatedAsc,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(oldest_first[0].id, older.id);

    let ordered_only = ledger
        .documents
        .list_purchases(&DocumentFilter {
            status: Some("ordered".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(ordered_only.len(), 1);
    assert_eq!(ordered_only[0].id, older.id);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_never_oversell() {
    let ledger = Ledger::new().await;
    ledger.seed(ledger.p1, ledger.w1, 10).await;

    let mut tasks = Vec::new();
    for _ in 0..25 {
        let engine = ledger.engine.clone();
        let input = ledger.sale(ledger.w1, &[(ledger.p1, 1)]);
        tasks.push(tokio::spawn(async move { engine.create_sale(input).await }));
    }

    let mut completed = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => completed += 1,
            Err(AppError::InsufficientStock { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(completed, 10);
    assert_eq!(rejected, 15);
    assert_eq!(ledger.stock(ledger.p1, ledger.w1).await, 0);
}
