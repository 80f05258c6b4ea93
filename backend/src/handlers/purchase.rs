//! HTTP handlers for purchase order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::{
    DocumentFilter, NewPurchaseOrder, PurchaseOrder, PurchaseOrderPatch, PurchaseReceipt,
    PurchaseStatus,
};

use super::TransitionRequest;
use crate::error::AppResult;
use crate::middleware::{authorize, Command, CurrentUser};
use crate::services::{DocumentService, LedgerEngine, PurchaseOrderView};
use crate::AppState;

/// List purchase orders
pub async fn list_purchases(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<DocumentFilter>,
) -> AppResult<Json<Vec<PurchaseOrderView>>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.list_purchases(&filter).await?))
}

/// Create a purchase order in DRAFT
pub async fn create_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewPurchaseOrder>,
) -> AppResult<(StatusCode, Json<PurchaseOrder>)> {
    authorize(&current_user.0, Command::CreatePurchase)?;
    let engine = LedgerEngine::new(state.store);
    let order = engine.create_purchase(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrderView>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.get_purchase(id).await?))
}

/// Edit a DRAFT purchase order
pub async fn update_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<PurchaseOrderPatch>,
) -> AppResult<Json<PurchaseOrderView>> {
    authorize(&current_user.0, Command::EditPurchase)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.update_purchase(id, patch).await?))
}

/// Record received quantities on an ORDERED purchase order
pub async fn record_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(receipt): Json<PurchaseReceipt>,
) -> AppResult<Json<PurchaseOrderView>> {
    authorize(&current_user.0, Command::EditPurchase)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.record_purchase_receipt(id, receipt).await?))
}

pub async fn delete_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(&current_user.0, Command::DeletePurchase)?;
    let service = DocumentService::new(state.store);
    service.delete_purchase(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move a purchase order to the requested status. RECEIVED (or COMPLETED)
/// adds the lines to stock and is restricted to administrators.
pub async fn confirm_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<TransitionRequest>,
) -> AppResult<Json<PurchaseOrder>> {
    let to: PurchaseStatus = request.target()?;
    authorize(&current_user.0, Command::purchase_transition(to))?;
    let engine = LedgerEngine::new(state.store);
    Ok(Json(engine.transition_purchase(request.id, to).await?))
}
