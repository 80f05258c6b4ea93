//! Shared fixtures for ledger integration tests
#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use retail_inventory_backend::{
    services::{CatalogService, DocumentService, LedgerEngine},
    store::{LedgerStore, MemoryLedgerStore, StockStore, UnitOfWork},
};
use shared::{
    ActivityStatus, NewProduct, NewPurchaseItem, NewPurchaseOrder, NewSalesItem, NewSalesOrder,
    NewSupplier, NewTransferItem, NewTransferOrder, NewWarehouse, StockKey,
};

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// In-memory ledger with two warehouses, one supplier and three products
pub struct Ledger {
    pub store: Arc<dyn LedgerStore>,
    pub engine: LedgerEngine,
    pub catalog: CatalogService,
    pub documents: DocumentService,
    pub w1: Uuid,
    pub w2: Uuid,
    pub supplier: Uuid,
    pub p1: Uuid,
    pub p2: Uuid,
    pub p3: Uuid,
}

impl Ledger {
    pub async fn new() -> Self {
        Self::with_store(Arc::new(MemoryLedgerStore::new())).await
    }

    pub async fn with_store(store: Arc<dyn LedgerStore>) -> Self {
        let catalog = CatalogService::new(store.clone());

        let w1 = warehouse(&catalog, "Main").await;
        let w2 = warehouse(&catalog, "Outlet").await;
        let supplier = catalog
            .create_supplier(NewSupplier {
                name: "Acme Wholesale".to_string(),
                email: Some("orders@acme.test".to_string()),
                phone: None,
                status: ActivityStatus::Active,
            })
            .await
            .unwrap()
            .id;

        let p1 = product(&catalog, "P-001").await;
        let p2 = product(&catalog, "P-002").await;
        let p3 = product(&catalog, "P-003").await;

        Self {
            engine: LedgerEngine::new(store.clone()),
            documents: DocumentService::new(store.clone()),
            store,
            catalog,
            w1,
            w2,
            supplier,
            p1,
            p2,
            p3,
        }
    }

    /// Overwrite a stock entry outside of any document
    pub async fn seed(&self, product_id: Uuid, warehouse_id: Uuid, quantity: i64) {
        let mut uow = self.store.begin().await.unwrap();
        uow.set_stock(StockKey::new(product_id, warehouse_id), quantity)
            .await
            .unwrap();
        uow.commit().await.unwrap();
    }

    pub async fn stock(&self, product_id: Uuid, warehouse_id: Uuid) -> i64 {
        let mut uow = self.store.begin().await.unwrap();
        let quantity = uow
            .get_stock(StockKey::new(product_id, warehouse_id))
            .await
            .unwrap();
        quantity
    }

    pub async fn cost_price(&self, product_id: Uuid) -> Decimal {
        self.catalog.get_product(product_id).await.unwrap().cost_price
    }

    pub fn sale(&self, warehouse_id: Uuid, lines: &[(Uuid, i64)]) -> NewSalesOrder {
        NewSalesOrder {
            warehouse_id: Some(warehouse_id),
            items: Some(
                lines
                    .iter()
                    .map(|&(product_id, quantity)| NewSalesItem {
                        product_id,
                        quantity,
                        unit_price: dec("9.99"),
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn purchase(&self, warehouse_id: Uuid, lines: &[(Uuid, i64, &str)]) -> NewPurchaseOrder {
        NewPurchaseOrder {
            supplier_id: self.supplier,
            warehouse_id,
            notes: None,
            items: lines
                .iter()
                .map(|&(product_id, quantity, price)| NewPurchaseItem {
                    product_id,
                    quantity,
                    unit_price: dec(price),
                })
                .collect(),
        }
    }

    pub fn transfer(&self, source: Uuid, dest: Uuid, lines: &[(Uuid, i64)]) -> NewTransferOrder {
        NewTransferOrder {
            source_warehouse_id: source,
            dest_warehouse_id: dest,
            notes: None,
            items: lines
                .iter()
                .map(|&(product_id, quantity)| NewTransferItem {
                    product_id,
                    quantity,
                })
                .collect(),
        }
    }
}

async fn warehouse(catalog: &CatalogService, name: &str) -> Uuid {
    catalog
        .create_warehouse(NewWarehouse {
            name: name.to_string(),
            location: None,
            status: ActivityStatus::Active,
        })
        .await
        .unwrap()
        .id
}

async fn product(catalog: &CatalogService, sku: &str) -> Uuid {
    catalog
        .create_product(NewProduct {
            sku: sku.to_string(),
            name: format!("Product {}", sku),
            category_id: None,
            cost_price: dec("5.00"),
            selling_price: dec("9.99"),
            safety_stock: 0,
        })
        .await
        .unwrap()
        .id
}
