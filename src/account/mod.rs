//! Account management module

pub mod error;
pub mod models;
pub mod service;

pub use error::AccountError;
pub use models::{Account, NewAccount};
pub use service::AccountService;
