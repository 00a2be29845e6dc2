//! Account handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, error_codes};
use super::parse_id;
use crate::account::{Account, NewAccount};
use crate::core_types::AccountId;

/// POST /api/accounts
///
/// Body: `{"balance": "100.00"}`; `balance` may be omitted (zero).
/// A balance with more than 2 decimals is rejected with 422.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewAccount>, JsonRejection>,
) -> ApiResult<Account> {
    let Json(req) = body?;
    let account = state.accounts.create_account(req).await?;
    Ok(Json(account))
}

/// GET /api/accounts/{id}
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Account> {
    let id: AccountId = parse_id(&id)?;
    state
        .accounts
        .get_account(id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::not_found(
                error_codes::ACCOUNT_NOT_FOUND,
                format!("Account not found: {}", id),
            )
        })
}
