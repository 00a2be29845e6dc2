//! Transfer handlers
//!
//! Submission returns as soon as the transfer is queued; clients poll
//! `GET /api/transfers/{id}` for the outcome.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

use super::super::state::AppState;
use super::super::types::ApiResult;
use super::parse_id;
use crate::core_types::{AccountId, TransferId};
use crate::transfer::{Transfer, TransferRequest};

/// POST /api/transfers
///
/// - 200: transfer queued as PENDING
/// - 422: missing account id, bad amount (format, sign, more than 2 decimals)
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<Transfer> {
    let Json(req) = body?;
    let transfer = state.transfers.submit_transfer(req).await?;
    Ok(Json(transfer))
}

/// GET /api/transfers/{id}
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Transfer> {
    let id: TransferId = parse_id(&id)?;
    Ok(Json(state.transfers.get_transfer(id).await?))
}

/// GET /api/transfers/by-account/{id}
pub async fn get_transfers_by_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Transfer>> {
    let id: AccountId = parse_id(&id)?;
    Ok(Json(state.transfers.transfers_by_account(id).await?))
}
