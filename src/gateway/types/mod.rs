//! Gateway types module
//!
//! Request bodies are the domain request types themselves
//! ([`crate::account::NewAccount`], [`crate::transfer::TransferRequest`]);
//! this module only carries the error side of the API boundary.

pub mod response;

pub use response::{ApiError, ApiResult, ErrorBody, error_codes};
