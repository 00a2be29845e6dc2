//! Transfer Engine
//!
//! Asynchronous money movement between accounts.
//!
//! # Architecture
//!
//! ```text
//! submit ──► pending collection ──► TransferProcessor ──► TransferApplier ──► completed collection
//!            (PENDING)              (oldest-N, bounded)   (one txn: take,     (DONE | FAILED)
//!                                                          validate, settle)
//! ```
//!
//! # State Machine
//!
//! ```text
//! PENDING ─┬─► DONE
//!          └─► FAILED (failReasons non-empty)
//! ```
//!
//! # Invariants
//!
//! 1. **Zero-sum**: an applied transfer debits and credits the same amount
//! 2. **No overdraft**: a debit never exceeds the balance it was validated against
//! 3. **Exactly-once**: the pending get-and-remove commits at most once per id
//! 4. **Single home**: a transfer is in exactly one collection at any time

pub mod applier;
pub mod error;
pub mod processor;
pub mod service;
pub mod state;
pub mod types;
pub mod validator;

// Re-exports for convenience
pub use applier::{ApplyOutcome, TransferApplier};
pub use error::{Side, TransferError};
pub use processor::{
    ProcessorConfig, ProcessorHandle, ProcessorStats, ProcessorStatsSnapshot, RetryPolicy,
    TransferExecutor, TransferProcessor,
};
pub use service::TransferService;
pub use state::{FailReason, TransferStatus};
pub use types::{FailReasons, Transfer, TransferRequest};
pub use validator::{Verdict, validate};
