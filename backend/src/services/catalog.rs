//! Catalog service for products, warehouses, suppliers and categories

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use shared::{
    validate_price, validate_sku, ActivityStatus, Category, NewCategory, NewProduct,
    NewSupplier, NewWarehouse, Product, Supplier, Warehouse,
};

use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

/// Catalog service
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LedgerStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Products
    // ========================================================================

    /// Create a product. The SKU must be unique.
    pub async fn create_product(&self, input: NewProduct) -> AppResult<Product> {
        input.validate()?;
        validate_sku(&input.sku).map_err(|m| AppError::validation("sku", m))?;
        validate_price(input.cost_price).map_err(|m| AppError::validation("costPrice", m))?;
        validate_price(input.selling_price)
            .map_err(|m| AppError::validation("sellingPrice", m))?;

        let mut uow = self.store.begin().await?;
        if let Some(category_id) = input.category_id {
            if uow.get_category(category_id).await?.is_none() {
                return Err(AppError::validation(
                    "categoryId",
                    format!("Unknown category {}", category_id),
                ));
            }
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            sku: input.sku,
            name: input.name,
            category_id: input.category_id,
            cost_price: input.cost_price,
            selling_price: input.selling_price,
            safety_stock: input.safety_stock,
            created_at: now,
            updated_at: now,
        };
        uow.insert_product(&product).await?;
        uow.commit().await?;

        tracing::info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: Uuid) -> AppResult<Product> {
        let mut uow = self.store.begin().await?;
        let product = uow.get_product(id).await?;
        product.ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    pub async fn list_products(&self) -> AppResult<Vec<Product>> {
        let mut uow = self.store.begin().await?;
        let products = uow.list_products().await?;
        Ok(products)
    }

    // ========================================================================
    // Warehouses
    // ========================================================================

    pub async fn create_warehouse(&self, input: NewWarehouse) -> AppResult<Warehouse> {
        input.validate()?;

        let now = Utc::now();
        let warehouse = Warehouse {
            id: Uuid::new_v4(),
            name: input.name,
            location: input.location,
            status: input.status,
            created_at: now,
            updated_at: now,
        };

        let mut uow = self.store.begin().await?;
        uow.insert_warehouse(&warehouse).await?;
        uow.commit().await?;

        tracing::info!(warehouse_id = %warehouse.id, "Warehouse created");
        Ok(warehouse)
    }

    pub async fn get_warehouse(&self, id: Uuid) -> AppResult<Warehouse> {
        let mut uow = self.store.begin().await?;
        let warehouse = uow.get_warehouse(id).await?;
        warehouse.ok_or_else(|| AppError::NotFound("Warehouse".to_string()))
    }

    pub async fn list_warehouses(&self) -> AppResult<Vec<Warehouse>> {
        let mut uow = self.store.begin().await?;
        let warehouses = uow.list_warehouses().await?;
        Ok(warehouses)
    }

    /// Delete a warehouse that holds no stock
    pub async fn delete_warehouse(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        if uow.get_warehouse(id).await?.is_none() {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }

        let held = uow.warehouse_stock_total(id).await?;
        if held > 0 {
            return Err(AppError::DocumentLocked(format!(
                "Warehouse still holds {} units of stock",
                held
            )));
        }

        uow.delete_warehouse(id).await?;
        uow.commit().await?;

        tracing::info!(warehouse_id = %id, "Warehouse deleted");
        Ok(())
    }

    // ========================================================================
    // Suppliers
    // ========================================================================

    pub async fn create_supplier(&self, input: NewSupplier) -> AppResult<Supplier> {
        input.validate()?;

        let now = Utc::now();
        let supplier = Supplier {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            status: input.status,
            created_at: now,
            updated_at: now,
        };

        let mut uow = self.store.begin().await?;
        uow.insert_supplier(&supplier).await?;
        uow.commit().await?;

        tracing::info!(supplier_id = %supplier.id, "Supplier created");
        Ok(supplier)
    }

    pub async fn get_supplier(&self, id: Uuid) -> AppResult<Supplier> {
        let mut uow = self.store.begin().await?;
        let supplier = uow.get_supplier(id).await?;
        supplier.ok_or_else(|| AppError::NotFound("Supplier".to_string()))
    }

    pub async fn list_suppliers(&self) -> AppResult<Vec<Supplier>> {
        let mut uow = self.store.begin().await?;
        let suppliers = uow.list_suppliers().await?;
        Ok(suppliers)
    }

    /// Delete a supplier that is no longer active
    pub async fn delete_supplier(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let supplier = uow
            .get_supplier(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;

        if supplier.status == ActivityStatus::Active {
            return Err(AppError::DocumentLocked(
                "Active suppliers cannot be deleted".to_string(),
            ));
        }

        uow.delete_supplier(id).await?;
        uow.commit().await?;

        tracing::info!(supplier_id = %id, "Supplier deleted");
        Ok(())
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub async fn create_category(&self, input: NewCategory) -> AppResult<Category> {
        input.validate()?;

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: input.name,
            status: input.status,
            created_at: now,
            updated_at: now,
        };

        let mut uow = self.store.begin().await?;
        uow.insert_category(&category).await?;
        uow.commit().await?;

        tracing::info!(category_id = %category.id, "Category created");
        Ok(category)
    }

    pub async fn get_category(&self, id: Uuid) -> AppResult<Category> {
        let mut uow = self.store.begin().await?;
        let category = uow.get_category(id).await?;
        category.ok_or_else(|| AppError::NotFound("Category".to_string()))
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let mut uow = self.store.begin().await?;
        let categories = uow.list_categories().await?;
        Ok(categories)
    }

    /// Delete a category that is inactive or unused. Products in a deleted
    /// category become uncategorized.
    pub async fn delete_category(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let category = uow
            .get_category(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category".to_string()))?;

        let products = uow.count_products_in_category(id).await?;
        if category.status.is_active() && products > 0 {
            return Err(AppError::DocumentLocked(format!(
                "Active category is used by {} products",
                products
            )));
        }

        uow.delete_category(id).await?;
        uow.commit().await?;

        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }
}
