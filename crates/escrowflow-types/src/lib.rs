//! # escrowflow-types
//!
//! Shared types, errors, and configuration for the **EscrowFlow** two-party
//! escrow orchestrator.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`EscrowId`], [`Signature`], [`Blockhash`], [`FlowRunId`]
//! - **Lifecycle**: [`EscrowState`], [`EscrowRecord`]
//! - **Steps**: [`FlowStep`], [`ESCROW_STEP_TABLE`]
//! - **Transactions**: [`Instruction`], [`Transaction`], [`SubmitOptions`], [`ConfirmationReport`]
//! - **Signing**: [`TransactionSigner`], [`Keypair`], [`Wallet`]
//! - **Program interfaces**: [`program::system`], [`program::token`], [`program::settlement`]
//! - **Receipts**: [`SettlementReceipt`], [`FinalBalances`], [`TokenAmount`]
//! - **Configuration**: [`FlowConfig`]
//! - **Errors**: [`EscrowFlowError`] (`EF_ERR_`), [`LedgerError`] (`LD_ERR_`)
//! - **Constants**: system-wide limits and defaults

pub mod amount;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod program;
pub mod receipt;
pub mod signer;
pub mod step;
pub mod transaction;

// Re-export all primary types at crate root for ergonomic imports:
//   use escrowflow_types::{Address, EscrowId, FlowStep, ...};

pub use amount::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use lifecycle::*;
pub use receipt::*;
pub use signer::*;
pub use step::*;
pub use transaction::*;

// Constants and program interfaces are accessed via their module paths
// (not re-exported to avoid name collisions).
