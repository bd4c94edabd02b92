//! # escrowflow-address
//!
//! Deterministic address derivation, testable without a ledger connection.
//!
//! - [`pda`]: the derivation primitive (`find_program_address`,
//!   `create_program_address`, on-curve test)
//! - [`deriver`]: [`EscrowDeriver`], which computes the escrow record address
//!   from `(maker, maker_asset, escrow_id)` and the custody accounts around it

pub mod deriver;
pub mod pda;

pub use deriver::{EscrowAddresses, EscrowDeriver};
pub use pda::{create_program_address, find_program_address, is_on_curve};
