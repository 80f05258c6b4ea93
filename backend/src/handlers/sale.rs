//! HTTP handlers for sales order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::{DocumentFilter, NewSalesOrder, SaleStatus, SalesOrder, SalesOrderPatch};

use super::TransitionRequest;
use crate::error::AppResult;
use crate::middleware::{authorize, Command, CurrentUser};
use crate::services::{DocumentService, LedgerEngine, SalesOrderView};
use crate::AppState;

pub async fn list_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<DocumentFilter>,
) -> AppResult<Json<Vec<SalesOrderView>>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.list_sales(&filter).await?))
}

/// Create a sale; completes and issues stock immediately unless created as DRAFT
pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewSalesOrder>,
) -> AppResult<(StatusCode, Json<SalesOrder>)> {
    authorize(&current_user.0, Command::CreateSale)?;
    let engine = LedgerEngine::new(state.store);
    let order = engine.create_sale(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SalesOrderView>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.get_sale(id).await?))
}

pub async fn update_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<SalesOrderPatch>,
) -> AppResult<Json<SalesOrderView>> {
    authorize(&current_user.0, Command::EditSale)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.update_sale(id, patch).await?))
}

pub async fn delete_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(&current_user.0, Command::DeleteSale)?;
    let service = DocumentService::new(state.store);
    service.delete_sale(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Complete or cancel a DRAFT sale
pub async fn confirm_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<TransitionRequest>,
) -> AppResult<Json<SalesOrder>> {
    let to: SaleStatus = request.target()?;
    authorize(&current_user.0, Command::sale_transition(to))?;
    let engine = LedgerEngine::new(state.store);
    Ok(Json(engine.transition_sale(request.id, to).await?))
}
