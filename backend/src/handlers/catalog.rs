//! HTTP handlers for catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::{
    Category, NewCategory, NewProduct, NewSupplier, NewWarehouse, Product, Supplier, Warehouse,
};

use crate::error::AppResult;
use crate::middleware::{authorize, Command, CurrentUser};
use crate::services::CatalogService;
use crate::AppState;

// ============================================================================
// Products
// ============================================================================

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewProduct>,
) -> AppResult<(StatusCode, Json<Product>)> {
    authorize(&current_user.0, Command::ManageCatalog)?;
    let service = CatalogService::new(state.store);
    let product = service.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = CatalogService::new(state.store);
    Ok(Json(service.get_product(id).await?))
}

pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = CatalogService::new(state.store);
    Ok(Json(service.list_products().await?))
}

// ============================================================================
// Warehouses
// ============================================================================

pub async fn create_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewWarehouse>,
) -> AppResult<(StatusCode, Json<Warehouse>)> {
    authorize(&current_user.0, Command::ManageCatalog)?;
    let service = CatalogService::new(state.store);
    let warehouse = service.create_warehouse(input).await?;
    Ok((StatusCode::CREATED, Json(warehouse)))
}

pub async fn get_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Warehouse>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = CatalogService::new(state.store);
    Ok(Json(service.get_warehouse(id).await?))
}

pub async fn list_warehouses(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Warehouse>>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = CatalogService::new(state.store);
    Ok(Json(service.list_warehouses().await?))
}

/// Delete a warehouse that holds no stock
pub async fn delete_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(&current_user.0, Command::ManageCatalog)?;
    let service = CatalogService::new(state.store);
    service.delete_warehouse(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Suppliers
// ============================================================================

pub async fn create_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewSupplier>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    authorize(&current_user.0, Command::ManageCatalog)?;
    let service = CatalogService::new(state.store);
    let supplier = service.create_supplier(input).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = CatalogService::new(state.store);
    Ok(Json(service.get_supplier(id).await?))
}

pub async fn list_suppliers(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Supplier>>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = CatalogService::new(state.store);
    Ok(Json(service.list_suppliers().await?))
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(&current_user.0, Command::ManageCatalog)?;
    let service = CatalogService::new(state.store);
    service.delete_supplier(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Categories
// ============================================================================

pub async fn create_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewCategory>,
) -> AppResult<(StatusCode, Json<Category>)> {
    authorize(&current_user.0, Command::ManageCatalog)?;
    let service = CatalogService::new(state.store);
    let category = service.create_category(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Category>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = CatalogService::new(state.store);
    Ok(Json(service.get_category(id).await?))
}

pub async fn list_categories(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Category>>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = CatalogService::new(state.store);
    Ok(Json(service.list_categories().await?))
}

pub async fn delete_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(&current_user.0, Command::ManageCatalog)?;
    let service = CatalogService::new(state.store);
    service.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
