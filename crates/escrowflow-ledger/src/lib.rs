//! # escrowflow-ledger
//!
//! The boundary between the orchestrator and a ledger node.
//!
//! - [`LedgerConnection`]: async trait covering blockhash, submission,
//!   confirmation and balance queries
//! - [`ConfirmationWaiter`]: fresh blockhash, sign, submit, bounded wait, and
//!   classification of the outcome into step-tagged errors
//! - [`LocalLedger`]: in-process ledger with the system, token,
//!   associated-account and settlement programs, supply conservation checks
//!   and fault injection

pub mod connection;
pub mod local;
pub mod waiter;

pub use connection::LedgerConnection;
pub use local::{
    Fault, InstructionKind, LocalLedger, SubmissionOutcome, SubmissionRecord, SupplyMismatch,
};
pub use waiter::ConfirmationWaiter;
