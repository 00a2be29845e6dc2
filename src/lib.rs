//! Money Transfer - asynchronous, exactly-once balance transfers
//!
//! Transfers are queued as PENDING and resolved in the background by a
//! backpressure-aware processor, each inside one optimistic store transaction.
//!
//! # Modules
//!
//! - [`core_types`] - `AccountId`, `TransferId`
//! - [`money`] - Amount well-formedness rules and `StrictDecimal`
//! - [`account`] - Account model and service
//! - [`store`] - Ledger store contract and the in-process `MemoryStore`
//! - [`transfer`] - Validator, applier, processor and transfer service
//! - [`gateway`] - axum REST layer
//! - [`config`] / [`logging`] - YAML configuration and tracing setup

// Core types - must be first!
pub mod core_types;
pub mod money;

// Domain
pub mod account;
pub mod store;
pub mod transfer;

// Service plumbing
pub mod config;
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use account::{Account, AccountError, AccountService, NewAccount};
pub use core_types::{AccountId, TransferId};
pub use store::{LedgerStore, LedgerTxn, MemoryStore, StoreError, TransferCollection};
pub use transfer::{
    ApplyOutcome, FailReason, ProcessorConfig, ProcessorHandle, Transfer, TransferApplier,
    TransferError, TransferProcessor, TransferRequest, TransferService, TransferStatus,
};
