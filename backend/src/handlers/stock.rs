//! HTTP handlers for stock queries

use axum::{
    extract::{Query, State},
    Json,
};

use shared::{StockEntry, StockFilter};

use crate::error::AppResult;
use crate::middleware::{authorize, Command, CurrentUser};
use crate::services::LedgerEngine;
use crate::AppState;

/// List stock entries, optionally filtered by product and/or warehouse
pub async fn list_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Vec<StockEntry>>> {
    authorize(&current_user.0, Command::ReadData)?;
    let engine = LedgerEngine::new(state.store);
    let entries = engine.stock_levels(&filter).await?;
    Ok(Json(entries))
}
