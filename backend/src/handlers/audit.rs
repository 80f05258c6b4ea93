//! HTTP handlers for inventory audit endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::{AuditCounts, AuditStatus, DocumentFilter, InventoryAudit, NewInventoryAudit};

use super::TransitionRequest;
use crate::error::AppResult;
use crate::middleware::{authorize, Command, CurrentUser};
use crate::services::{DocumentService, InventoryAuditView, LedgerEngine};
use crate::AppState;

pub async fn list_audits(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<DocumentFilter>,
) -> AppResult<Json<Vec<InventoryAuditView>>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.list_audits(&filter).await?))
}

pub async fn create_audit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewInventoryAudit>,
) -> AppResult<(StatusCode, Json<InventoryAudit>)> {
    authorize(&current_user.0, Command::CreateAudit)?;
    let engine = LedgerEngine::new(state.store);
    let audit = engine.create_audit(input).await?;
    Ok((StatusCode::CREATED, Json(audit)))
}

pub async fn get_audit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<InventoryAuditView>> {
    authorize(&current_user.0, Command::ReadData)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.get_audit(id).await?))
}

/// Record counted quantities
pub async fn record_counts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(counts): Json<AuditCounts>,
) -> AppResult<Json<InventoryAuditView>> {
    authorize(&current_user.0, Command::RecordCounts)?;
    let service = DocumentService::new(state.store);
    Ok(Json(service.record_audit_counts(id, counts).await?))
}

pub async fn delete_audit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(&current_user.0, Command::DeleteAudit)?;
    let service = DocumentService::new(state.store);
    service.delete_audit(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Start an audit or complete it, reconciling stock to the counts
pub async fn confirm_audit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<TransitionRequest>,
) -> AppResult<Json<InventoryAudit>> {
    let to: AuditStatus = request.target()?;
    authorize(&current_user.0, Command::audit_transition(to))?;
    let engine = LedgerEngine::new(state.store);
    Ok(Json(engine.transition_audit(request.id, to).await?))
}
