//! API error type and error codes
//!
//! Successful responses return the entity JSON directly. Errors are
//! `{"code": <i32>, "msg": <string>}` with a matching HTTP status.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::account::AccountError;
use crate::store::StoreError;
use crate::transfer::TransferError;

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INVALID_AMOUNT: i32 = 1002;
    pub const MISSING_ACCOUNT: i32 = 1003;
    pub const INVALID_ID: i32 = 1004;
    pub const INVALID_BALANCE: i32 = 1005;

    // Resource errors (4xxx)
    pub const ACCOUNT_NOT_FOUND: i32 = 4001;
    pub const TRANSFER_NOT_FOUND: i32 = 4002;

    // Server errors (5xxx)
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

// ============================================================================
// ApiError
// ============================================================================

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: i32,
    pub msg: String,
}

/// Handler error: HTTP status plus error body
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, msg)
    }

    pub fn not_found(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            msg: self.msg,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Store error while serving request");
        ApiError::service_unavailable(e.to_string())
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        if let TransferError::Store(store) = e {
            return store.into();
        }
        if e.is_client_error() {
            tracing::debug!(code = e.code(), error = %e, "Rejected transfer request");
        }

        let code = match &e {
            TransferError::MissingAccount(_) => error_codes::MISSING_ACCOUNT,
            TransferError::InvalidAmount(_) => error_codes::INVALID_AMOUNT,
            TransferError::TransferNotFound(_) => error_codes::TRANSFER_NOT_FOUND,
            TransferError::Store(_) => error_codes::SERVICE_UNAVAILABLE,
        };
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiError::new(status, code, e.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::Store(store) => store.into(),
            AccountError::InvalidBalance(_) => {
                tracing::debug!(code = e.code(), error = %e, "Rejected account request");
                let status = StatusCode::from_u16(e.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                ApiError::new(status, error_codes::INVALID_BALANCE, e.to_string())
            }
        }
    }
}

/// Body that failed to parse or deserialize
///
/// Keeps axum's status: 400 for malformed JSON, 415 for a missing content
/// type, 422 for a well-formed body with bad field values.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(
            rejection.status(),
            error_codes::INVALID_PARAMETER,
            rejection.body_text(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::MoneyError;
    use crate::transfer::Side;

    #[test]
    fn test_transfer_error_mapping() {
        let err: ApiError = TransferError::InvalidAmount(MoneyError::NotPositive).into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, error_codes::INVALID_AMOUNT);

        let err: ApiError = TransferError::MissingAccount(Side::From).into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, error_codes::MISSING_ACCOUNT);

        let err: ApiError = TransferError::TransferNotFound("x".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_account_error_mapping() {
        let err: ApiError = AccountError::InvalidBalance(MoneyError::PrecisionOverflow {
            provided: 28,
            max: 2,
        })
        .into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, error_codes::INVALID_BALANCE);

        let err: ApiError = AccountError::Store(StoreError::Conflict).into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_store_error_is_unavailable() {
        let err: ApiError = TransferError::Store(StoreError::Unavailable("down".into())).into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, error_codes::SERVICE_UNAVAILABLE);
    }
}
