//! HTTP handlers

pub mod audit;
pub mod catalog;
pub mod health;
pub mod purchase;
pub mod sale;
pub mod stock;
pub mod transfer;

pub use audit::*;
pub use catalog::*;
pub use health::*;
pub use purchase::*;
pub use sale::*;
pub use stock::*;
pub use transfer::*;

use serde::Deserialize;
use uuid::Uuid;

use shared::DocumentStatus;

use crate::error::{AppError, AppResult};

/// Body of every `/confirm` endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub id: Uuid,
    pub status: String,
}

impl TransitionRequest {
    /// Parse the requested status for one document family
    pub fn target<S: DocumentStatus>(&self) -> AppResult<S> {
        self.status
            .parse::<S>()
            .map_err(|e| AppError::validation("status", e.to_string()))
    }
}
