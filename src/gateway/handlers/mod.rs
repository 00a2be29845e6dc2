pub mod account;
pub mod health;
pub mod transfer;

pub use account::{create_account, get_account};
pub use health::health_check;
pub use transfer::{create_transfer, get_transfer, get_transfers_by_account};

use std::str::FromStr;

use super::types::{ApiError, error_codes};

/// Parse a path id, 400 on malformed input
fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse().map_err(|e| {
        ApiError::bad_request(
            error_codes::INVALID_ID,
            format!("Invalid id '{}': {}", raw, e),
        )
    })
}
