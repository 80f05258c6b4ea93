//! HTTP handlers for transfer order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::{DocumentFilter, NewTransferOrder, TransferOrder, TransferOrderPatch, TransferStatus};

use super::TransitionRequest;
use crate::error::AppResult;
use crate::middleware::{authorize, Command, CurrentUser};
use crate::services::{DocumentService, LedgerEngine, TransferOrderView};
use crate::AppState;

pub async fn list_transfers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<DocumentFilter>,
) -> AppResult<Json<Vec<TransferOrderView>>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.list_transfers(&filter).await?))
}

pub async fn create_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewTransferOrder>,
) -> AppResult<(StatusCode, Json<TransferOrder>)> {
    authorize(&current_user.0, Command::CreateTransfer)?;
    let engine = LedgerEngine::new(state.store);
    let order = engine.create_transfer(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TransferOrderView>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.get_transfer(id).await?))
}

pub async fn update_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<TransferOrderPatch>,
) -> AppResult<Json<TransferOrderView>> {
    authorize(&current_user.0, Command::EditTransfer)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.update_transfer(id, patch).await?))
}

pub async fn delete_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(&current_user.0, Command::DeleteTransfer)?;
    let service = DocumentService::new(state.store);
    service.delete_transfer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Dispatch, complete or cancel a transfer
pub async fn confirm_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<TransitionRequest>,
) -> AppResult<Json<TransferOrder>> {
    let to: TransferStatus = request.target()?;
    authorize(&current_user.0, Command::transfer_transition(to))?;
    let engine = LedgerEngine::new(state.store);
    Ok(Json(engine.transition_transfer(request.id, to).await?))
}
